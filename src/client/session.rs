//! Initiating side of the websocket protocol

use std::collections::VecDeque;
use std::future::Future;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::ws::codec::{decode_server, encode_client};
use crate::ws::protocol::{
    ApiReply, ApiRequest, ClientMessage, ClientSync, GameStartMsg, PlayerInfo, ServerMessage,
};

use super::backoff::Backoff;
use super::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A logged-in connection to the server
pub struct ClientSession {
    ws: WsStream,
    player: PlayerInfo,
    /// Pushes that arrived while waiting for a response
    backlog: VecDeque<ServerMessage>,
}

impl ClientSession {
    /// Open a websocket to `url` and log in as `nickname`
    pub async fn connect(url: &str, nickname: &str) -> Result<Self, ClientError> {
        let (ws, _) = connect_async(url).await?;
        let mut session = Self {
            ws,
            player: PlayerInfo {
                id: 0,
                nickname: nickname.to_string(),
                room_id: None,
            },
            backlog: VecDeque::new(),
        };

        match session
            .request(ApiRequest::PlayerJoin {
                nickname: nickname.to_string(),
            })
            .await?
        {
            ApiReply::PlayerJoin { player } => session.player = player,
            other => debug!(?other, "Unexpected login reply"),
        }
        info!(player_id = session.player.id, url, "Logged in");
        Ok(session)
    }

    pub fn player(&self) -> &PlayerInfo {
        &self.player
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let frame = encode_client(msg)?;
        self.ws.send(Message::Binary(frame.to_vec())).await?;
        Ok(())
    }

    pub async fn send_sync(&mut self, sync: ClientSync) -> Result<(), ClientError> {
        self.send(&ClientMessage::ClientSync(sync)).await
    }

    /// Next server message; malformed frames are skipped
    pub async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        if let Some(msg) = self.backlog.pop_front() {
            return Ok(msg);
        }
        self.read_frame().await
    }

    async fn read_frame(&mut self) -> Result<ServerMessage, ClientError> {
        loop {
            let Some(result) = self.ws.next().await else {
                return Err(ClientError::Closed);
            };
            match result? {
                Message::Binary(frame) => match decode_server(&frame) {
                    Ok(msg) => return Ok(msg),
                    Err(e) => warn!(error = %e, "Dropped malformed frame"),
                },
                Message::Close(_) => return Err(ClientError::Closed),
                other => trace!(?other, "Ignoring non-binary frame"),
            }
        }
    }

    /// Send one API call and wait for its response. Anything else that
    /// arrives meanwhile stays queued for [`recv`](Self::recv).
    pub async fn request(&mut self, request: ApiRequest) -> Result<ApiReply, ClientError> {
        let api = request.kind();
        self.send(&ClientMessage::Request(request)).await?;

        loop {
            match self.read_frame().await? {
                ServerMessage::Response(response) if response.api == api => {
                    return response
                        .outcome
                        .map_err(|message| ClientError::Rejected { api, message });
                }
                other => self.backlog.push_back(other),
            }
        }
    }

    /// Create a room and start a game in it right away
    pub async fn host_game(&mut self) -> Result<GameStartMsg, ClientError> {
        self.request(ApiRequest::RoomCreate).await?;
        self.request(ApiRequest::GameStart).await?;
        self.wait_game_start().await
    }

    /// Wait for the game start push, dropping roster updates on the way
    pub async fn wait_game_start(&mut self) -> Result<GameStartMsg, ClientError> {
        loop {
            match self.recv().await? {
                ServerMessage::GameStart(start) => return Ok(start),
                other => trace!(tag = ?other.tag(), "Skipped while waiting for game start"),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Keep a session alive: connect, run `play`, and on failure retry after
/// an exponentially growing delay. Returns once `play` finishes cleanly.
pub async fn run_with_reconnect<F, Fut>(
    url: &str,
    nickname: &str,
    backoff: &mut Backoff,
    mut play: F,
) where
    F: FnMut(ClientSession) -> Fut,
    Fut: Future<Output = Result<(), ClientError>>,
{
    loop {
        match ClientSession::connect(url, nickname).await {
            Ok(session) => {
                backoff.reset();
                match play(session).await {
                    Ok(()) => return,
                    Err(e) => warn!(error = %e, "Session ended"),
                }
            }
            Err(e) => warn!(error = %e, url, "Connect failed"),
        }

        let delay = backoff.next_delay();
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting");
        tokio::time::sleep(delay).await;
    }
}
