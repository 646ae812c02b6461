//! Lobby service - answers API calls and starts games

use tracing::{debug, info, warn};

use crate::sync::{Authority, Seat};
use crate::util::time::Scheduler;
use crate::ws::connection::Connection;
use crate::ws::protocol::{
    ApiReply, ApiRequest, ApiResponse, GameStartMsg, PlayerListMsg, RoomInfo, RoomListMsg,
    RoomMsg, ServerMessage,
};

use super::players::{Player, PlayerRegistry};
use super::room::RoomGame;
use super::rooms::{Departure, RoomRegistry};
use super::{LobbyConfig, LobbyError};

pub struct LobbyService {
    config: LobbyConfig,
    players: PlayerRegistry,
    rooms: RoomRegistry,
}

impl LobbyService {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            players: PlayerRegistry::new(config.max_players),
            rooms: RoomRegistry::new(config.max_rooms, config.room_capacity),
            config,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn running_rooms(&self) -> usize {
        self.rooms.running_count()
    }

    /// Answer one API call. Validation failures become error responses.
    pub fn handle_request(&self, connection: &Connection, request: ApiRequest) -> ApiResponse {
        let api = request.kind();
        match self.dispatch(connection, request) {
            Ok(reply) => ApiResponse::ok(api, reply),
            Err(e) => {
                debug!(connection = connection.id(), ?api, error = %e, "Request rejected");
                ApiResponse::error(api, e.to_string())
            }
        }
    }

    fn dispatch(&self, connection: &Connection, request: ApiRequest) -> Result<ApiReply, LobbyError> {
        match request {
            ApiRequest::PlayerJoin { nickname } => {
                let player = self.players.login(connection, &nickname)?;
                self.sync_players();
                Ok(ApiReply::PlayerJoin { player })
            }
            ApiRequest::PlayerList => {
                self.require_player(connection)?;
                Ok(ApiReply::PlayerList {
                    list: self.players.list(),
                })
            }
            ApiRequest::RoomList => {
                self.require_player(connection)?;
                Ok(ApiReply::RoomList {
                    list: self.room_list(),
                })
            }
            ApiRequest::RoomCreate => self.create_room(connection),
            ApiRequest::RoomJoin { room_id } => self.join_room(connection, room_id),
            ApiRequest::RoomLeave => {
                let player = self.require_player(connection)?;
                let room_id = player.room_id.ok_or(LobbyError::NotInRoom)?;
                self.leave_room(&player, room_id);
                Ok(ApiReply::RoomLeave)
            }
            ApiRequest::GameStart => self.start_game(connection),
        }
    }

    /// Release everything a closed connection held
    pub fn disconnect(&self, connection: &Connection) {
        connection.unlisten_sync();
        let Some(id) = self.players.id_for(connection.id()) else {
            return;
        };
        if let Some(player) = self.players.get(id) {
            if let Some(room_id) = player.room_id {
                self.leave_room(&player, room_id);
            }
        }
        if self.players.logout(connection.id()).is_some() {
            self.sync_players();
        }
    }

    fn require_player(&self, connection: &Connection) -> Result<Player, LobbyError> {
        self.players
            .id_for(connection.id())
            .and_then(|id| self.players.get(id))
            .ok_or(LobbyError::NotLoggedIn)
    }

    fn create_room(&self, connection: &Connection) -> Result<ApiReply, LobbyError> {
        let player = self.require_player(connection)?;
        if player.room_id.is_some() {
            return Err(LobbyError::AlreadyInRoom);
        }

        let room_id = self.rooms.create(player.id, &player.nickname)?;
        self.players.set_room(player.id, Some(room_id));
        let room = self.room_info(room_id).ok_or(LobbyError::RoomNotFound(room_id))?;

        self.sync_rooms();
        self.sync_players();
        Ok(ApiReply::RoomCreate { room })
    }

    fn join_room(&self, connection: &Connection, room_id: u32) -> Result<ApiReply, LobbyError> {
        let player = self.require_player(connection)?;
        if player.room_id.is_some() {
            return Err(LobbyError::AlreadyInRoom);
        }

        self.rooms.join(room_id, player.id)?;
        self.players.set_room(player.id, Some(room_id));
        let room = self.room_info(room_id).ok_or(LobbyError::RoomNotFound(room_id))?;
        info!(room_id, player_id = player.id, "Player joined room");

        self.sync_room(&room);
        self.sync_rooms();
        self.sync_players();
        Ok(ApiReply::RoomJoin { room })
    }

    fn leave_room(&self, player: &Player, room_id: u32) {
        self.players.set_room(player.id, None);
        let departure = self
            .rooms
            .leave(room_id, player.id, player.connection.id());
        player.connection.unlisten_sync();
        info!(room_id, player_id = player.id, "Player left room");

        if let Some(Departure::Remaining { .. }) = departure {
            if let Some(room) = self.room_info(room_id) {
                self.sync_room(&room);
            }
        }
        self.sync_rooms();
        self.sync_players();
    }

    fn start_game(&self, connection: &Connection) -> Result<ApiReply, LobbyError> {
        let player = self.require_player(connection)?;
        let room_id = player.room_id.ok_or(LobbyError::NotInRoom)?;
        let seating = self.rooms.prepare_start(room_id, player.id)?;

        let members: Vec<Player> = seating
            .iter()
            .filter_map(|&id| self.players.get(id))
            .collect();
        let seats: Vec<Seat> = members
            .iter()
            .map(|p| Seat {
                connection: p.connection.id(),
                actor_id: p.id,
                nickname: p.nickname.clone(),
            })
            .collect();

        let authority = Authority::start(rand::random::<u32>(), &seats);
        let state = authority.snapshot();
        let scheduler = Scheduler::new(self.config.tick_rate, self.config.broadcast_rate);
        let connections: Vec<Connection> = members.iter().map(|p| p.connection.clone()).collect();
        let (game, handle) = RoomGame::new(room_id, authority, connections, scheduler);
        self.rooms.attach_game(room_id, handle);

        let room = self.room_info(room_id).ok_or(LobbyError::RoomNotFound(room_id))?;
        let start = ServerMessage::GameStart(GameStartMsg {
            room: room.clone(),
            state,
        });
        for member in &members {
            if !member.connection.send(&start) {
                warn!(room_id, player_id = member.id, "Game start to closed connection");
            }
        }

        tokio::spawn(game.run());
        info!(room_id, players = members.len(), "Game launched");

        self.sync_rooms();
        Ok(ApiReply::GameStart)
    }

    pub fn room_info(&self, room_id: u32) -> Option<RoomInfo> {
        let (name, owner_id, members, running) = self.rooms.with_room(room_id, |room| {
            (
                room.name.clone(),
                room.owner,
                room.members.clone(),
                room.is_running(),
            )
        })?;
        Some(RoomInfo {
            id: room_id,
            name,
            owner_id,
            players: members
                .into_iter()
                .filter_map(|id| self.players.info(id))
                .collect(),
            max_players: self.rooms.capacity(),
            running,
        })
    }

    pub fn room_list(&self) -> Vec<RoomInfo> {
        self.rooms
            .ids()
            .into_iter()
            .filter_map(|id| self.room_info(id))
            .collect()
    }

    fn sync_players(&self) {
        let msg = ServerMessage::PlayerList(PlayerListMsg {
            list: self.players.list(),
        });
        self.players.broadcast(&msg);
    }

    fn sync_rooms(&self) {
        let msg = ServerMessage::RoomList(RoomListMsg {
            list: self.room_list(),
        });
        self.players.broadcast(&msg);
    }

    fn sync_room(&self, room: &RoomInfo) {
        let msg = ServerMessage::Room(RoomMsg { room: room.clone() });
        for info in &room.players {
            if let Some(player) = self.players.get(info.id) {
                player.connection.send(&msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use crate::ws::codec::decode_server;
    use crate::ws::connection::ConnectionId;

    fn service() -> LobbyService {
        LobbyService::new(LobbyConfig {
            max_players: 3,
            max_rooms: 2,
            room_capacity: 2,
            ..LobbyConfig::default()
        })
    }

    fn call(lobby: &LobbyService, connection: &Connection, request: ApiRequest) -> Result<ApiReply, String> {
        lobby.handle_request(connection, request).outcome
    }

    fn join(lobby: &LobbyService, id: ConnectionId, nickname: &str) -> (Connection, mpsc::UnboundedReceiver<Bytes>) {
        let (connection, rx) = Connection::new(id);
        call(
            lobby,
            &connection,
            ApiRequest::PlayerJoin {
                nickname: nickname.into(),
            },
        )
        .unwrap();
        (connection, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.extend(decode_server(&frame).ok());
        }
        out
    }

    #[test]
    fn calls_before_login_are_rejected() {
        let lobby = service();
        let (connection, _rx) = Connection::new(1);
        for request in [
            ApiRequest::PlayerList,
            ApiRequest::RoomList,
            ApiRequest::RoomCreate,
            ApiRequest::RoomJoin { room_id: 1 },
            ApiRequest::RoomLeave,
            ApiRequest::GameStart,
        ] {
            assert_eq!(
                call(&lobby, &connection, request),
                Err(LobbyError::NotLoggedIn.to_string())
            );
        }
    }

    #[test]
    fn room_lifecycle_and_validation() {
        let lobby = service();
        let (ace, mut ace_rx) = join(&lobby, 1, "ace");
        let (bob, _bob_rx) = join(&lobby, 2, "bob");
        let (cat, _cat_rx) = join(&lobby, 3, "cat");

        let (dan, _dan_rx) = Connection::new(4);
        assert_eq!(
            call(&lobby, &dan, ApiRequest::PlayerJoin { nickname: "dan".into() }),
            Err(LobbyError::ServerFull.to_string())
        );

        let room = match call(&lobby, &ace, ApiRequest::RoomCreate) {
            Ok(ApiReply::RoomCreate { room }) => room,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(room.players.len(), 1);
        assert_eq!(
            call(&lobby, &ace, ApiRequest::RoomCreate),
            Err(LobbyError::AlreadyInRoom.to_string())
        );
        assert_eq!(
            call(&lobby, &bob, ApiRequest::RoomJoin { room_id: 42 }),
            Err(LobbyError::RoomNotFound(42).to_string())
        );
        assert!(call(&lobby, &bob, ApiRequest::RoomJoin { room_id: room.id }).is_ok());
        assert_eq!(
            call(&lobby, &cat, ApiRequest::RoomJoin { room_id: room.id }),
            Err(LobbyError::RoomFull.to_string())
        );
        assert_eq!(
            call(&lobby, &bob, ApiRequest::GameStart),
            Err(LobbyError::NotOwner.to_string())
        );
        assert_eq!(
            call(&lobby, &cat, ApiRequest::RoomLeave),
            Err(LobbyError::NotInRoom.to_string())
        );

        let pushed = drain(&mut ace_rx);
        assert!(pushed.iter().any(|m| matches!(m, ServerMessage::Room(r) if r.room.players.len() == 2)));

        assert!(call(&lobby, &ace, ApiRequest::RoomLeave).is_ok());
        let info = lobby.room_info(room.id).unwrap();
        assert_eq!(info.owner_id, lobby.players.id_for(2).unwrap());

        lobby.disconnect(&bob);
        assert_eq!(lobby.room_count(), 0);
        assert_eq!(lobby.player_count(), 2);
    }

    #[tokio::test]
    async fn game_start_seats_members_and_blocks_joins() {
        let lobby = service();
        let (ace, mut ace_rx) = join(&lobby, 1, "ace");
        let (bob, mut bob_rx) = join(&lobby, 2, "bob");
        let (cat, _cat_rx) = join(&lobby, 3, "cat");

        let room = match call(&lobby, &ace, ApiRequest::RoomCreate) {
            Ok(ApiReply::RoomCreate { room }) => room,
            other => panic!("unexpected {other:?}"),
        };
        call(&lobby, &bob, ApiRequest::RoomJoin { room_id: room.id }).unwrap();
        assert_eq!(call(&lobby, &ace, ApiRequest::GameStart), Ok(ApiReply::GameStart));
        assert_eq!(lobby.running_rooms(), 1);
        assert!(ace.is_listening() && bob.is_listening());

        for rx in [&mut ace_rx, &mut bob_rx] {
            let start = drain(rx).into_iter().find_map(|m| match m {
                ServerMessage::GameStart(start) => Some(start),
                _ => None,
            });
            let start = start.expect("game start pushed");
            assert!(start.room.running);
            assert_eq!(start.state.actors.len(), 2);
        }

        assert_eq!(
            call(&lobby, &ace, ApiRequest::GameStart),
            Err(LobbyError::GameRunning.to_string())
        );
        call(&lobby, &bob, ApiRequest::RoomLeave).unwrap();
        assert_eq!(
            call(&lobby, &cat, ApiRequest::RoomJoin { room_id: room.id }),
            Err(LobbyError::GameRunning.to_string())
        );

        lobby.disconnect(&ace);
        assert!(!ace.is_listening());
        assert_eq!(lobby.room_count(), 0);
    }
}
