//! Server-side handle for one websocket connection

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::lobby::room::RoomCommand;

use super::codec::encode_server;
use super::protocol::{ClientSync, ServerMessage};

pub type ConnectionId = u64;

/// Cheap to clone; every clone feeds the same writer task
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Bytes>,
    sync_listener: Arc<Mutex<Option<mpsc::UnboundedSender<RoomCommand>>>>,
}

impl Connection {
    /// Returns the handle and the receiving end for the writer task
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            outbound,
            sync_listener: Arc::new(Mutex::new(None)),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for the writer. Returns false once the socket is gone.
    pub fn send(&self, msg: &ServerMessage) -> bool {
        match encode_server(msg) {
            Ok(frame) => self.outbound.send(frame).is_ok(),
            Err(e) => {
                error!(connection = self.id, tag = ?msg.tag(), error = %e, "Failed to encode message");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Route this connection's sync frames to a room
    pub fn listen_sync(&self, room: mpsc::UnboundedSender<RoomCommand>) {
        *self.sync_listener.lock() = Some(room);
    }

    pub fn unlisten_sync(&self) {
        *self.sync_listener.lock() = None;
    }

    pub fn is_listening(&self) -> bool {
        self.sync_listener.lock().is_some()
    }

    /// Hand a sync frame to the registered room. Returns false when no room
    /// listens or the room has stopped.
    pub fn dispatch_sync(&self, sync: ClientSync) -> bool {
        let guard = self.sync_listener.lock();
        let Some(room) = guard.as_ref() else {
            debug!(connection = self.id, frame_id = sync.frame_id, "Sync outside a game dropped");
            return false;
        };
        room.send(RoomCommand::Sync {
            connection: self.id,
            sync,
        })
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Fixed, Input};
    use crate::ws::codec::decode_server;
    use crate::ws::protocol::ServerSync;

    fn sync(frame_id: u32) -> ClientSync {
        ClientSync {
            frame_id,
            input: Input::TimePast { dt: Fixed::ZERO },
        }
    }

    #[test]
    fn send_encodes_onto_the_outbound_queue() {
        let (connection, mut rx) = Connection::new(1);
        let msg = ServerMessage::ServerSync(ServerSync {
            last_frame_id: 4,
            inputs: vec![],
        });
        assert!(connection.send(&msg));

        let frame = rx.try_recv().unwrap();
        assert_eq!(decode_server(&frame).unwrap(), msg);

        drop(rx);
        assert!(connection.is_closed());
        assert!(!connection.send(&msg));
    }

    #[test]
    fn sync_reaches_only_the_current_listener() {
        let (connection, _rx) = Connection::new(7);
        assert!(!connection.dispatch_sync(sync(1)));

        let (room, mut commands) = mpsc::unbounded_channel();
        connection.listen_sync(room);
        assert!(connection.dispatch_sync(sync(2)));
        match commands.try_recv().unwrap() {
            RoomCommand::Sync { connection: id, sync } => {
                assert_eq!(id, 7);
                assert_eq!(sync.frame_id, 2);
            }
            _ => panic!("expected a sync command"),
        }

        connection.unlisten_sync();
        assert!(!connection.dispatch_sync(sync(3)));
        assert!(commands.try_recv().is_err());
    }
}
