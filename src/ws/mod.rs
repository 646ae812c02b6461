//! WebSocket transport and wire format

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

pub use codec::CodecError;
pub use connection::{Connection, ConnectionId};
