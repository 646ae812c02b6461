//! Client side: logged-in session and reconnect loop

pub mod backoff;
pub mod session;

pub use backoff::Backoff;
pub use session::{run_with_reconnect, ClientSession};

use crate::ws::codec::CodecError;
use crate::ws::protocol::ApiKind;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("server rejected {api:?}: {message}")]
    Rejected { api: ApiKind, message: String },

    #[error("connection closed by server")]
    Closed,
}
