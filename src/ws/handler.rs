//! WebSocket upgrade handler

use std::sync::atomic::Ordering;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;

use super::codec::decode_client;
use super::connection::{Connection, ConnectionId};
use super::protocol::{ClientMessage, ServerMessage};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let id = state.next_connection_id.fetch_add(1, Ordering::Relaxed);
    ws.on_upgrade(move |socket| handle_socket(socket, id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, id: ConnectionId, state: AppState) {
    info!(connection = id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (connection, outbound) = Connection::new(id);
    state.connections.insert(id, connection.clone());

    // Spawn writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(run_writer(id, ws_sink, outbound));

    run_reader(&state, &connection, ws_stream).await;

    // Cleanup on disconnect
    state.lobby.disconnect(&connection);
    state.connections.remove(&id);
    writer_handle.abort();

    info!(connection = id, "WebSocket connection closed");
}

async fn run_writer(
    id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = ws_sink.send(Message::Binary(frame.to_vec())).await {
            debug!(connection = id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Reader loop: WebSocket -> lobby or room
async fn run_reader(state: &AppState, connection: &Connection, mut ws_stream: SplitStream<WebSocket>) {
    let id = connection.id();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Binary(frame)) => match decode_client(&frame) {
                Ok(ClientMessage::Request(request)) => {
                    let response = state.lobby.handle_request(connection, request);
                    connection.send(&ServerMessage::Response(response));
                }
                Ok(ClientMessage::ClientSync(sync)) => {
                    connection.dispatch_sync(sync);
                }
                Err(e) => {
                    warn!(connection = id, error = %e, "Dropped malformed frame");
                }
            },
            Ok(Message::Text(_)) => {
                warn!(connection = id, "Received text message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(connection = id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection = id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection = id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}
