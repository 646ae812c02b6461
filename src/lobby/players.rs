//! Logged-in players

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::ws::connection::{Connection, ConnectionId};
use crate::ws::protocol::{PlayerInfo, ServerMessage};

use super::LobbyError;

/// Nickname length cap, in characters
pub const MAX_NICKNAME_LEN: usize = 16;

#[derive(Clone)]
pub struct Player {
    pub id: u32,
    pub nickname: String,
    pub room_id: Option<u32>,
    pub connection: Connection,
}

impl Player {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            nickname: self.nickname.clone(),
            room_id: self.room_id,
        }
    }
}

pub struct PlayerRegistry {
    players: DashMap<u32, Player>,
    by_connection: DashMap<ConnectionId, u32>,
    nicknames: DashMap<String, u32>,
    next_id: AtomicU32,
    capacity: usize,
}

impl PlayerRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            players: DashMap::new(),
            by_connection: DashMap::new(),
            nicknames: DashMap::new(),
            next_id: AtomicU32::new(1),
            capacity,
        }
    }

    /// Register `connection` under a unique nickname
    pub fn login(&self, connection: &Connection, nickname: &str) -> Result<PlayerInfo, LobbyError> {
        let nickname: String = nickname.trim().chars().take(MAX_NICKNAME_LEN).collect();
        if nickname.is_empty() {
            return Err(LobbyError::EmptyNickname);
        }
        if self.by_connection.contains_key(&connection.id()) {
            return Err(LobbyError::AlreadyLoggedIn);
        }
        if self.players.len() >= self.capacity {
            return Err(LobbyError::ServerFull);
        }

        let id = match self.nicknames.entry(nickname.clone()) {
            Entry::Occupied(_) => return Err(LobbyError::NicknameTaken(nickname)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(id);
                id
            }
        };

        let player = Player {
            id,
            nickname,
            room_id: None,
            connection: connection.clone(),
        };
        let info = player.info();
        self.players.insert(id, player);
        self.by_connection.insert(connection.id(), id);

        info!(player_id = id, nickname = %info.nickname, "Player logged in");
        Ok(info)
    }

    /// Forget the player behind `connection`, if any
    pub fn logout(&self, connection: ConnectionId) -> Option<Player> {
        let (_, id) = self.by_connection.remove(&connection)?;
        let (_, player) = self.players.remove(&id)?;
        self.nicknames.remove(&player.nickname);
        info!(player_id = id, nickname = %player.nickname, "Player logged out");
        Some(player)
    }

    pub fn id_for(&self, connection: ConnectionId) -> Option<u32> {
        self.by_connection.get(&connection).map(|id| *id)
    }

    pub fn get(&self, id: u32) -> Option<Player> {
        self.players.get(&id).map(|p| p.clone())
    }

    pub fn info(&self, id: u32) -> Option<PlayerInfo> {
        self.players.get(&id).map(|p| p.info())
    }

    pub fn set_room(&self, id: u32, room_id: Option<u32>) {
        if let Some(mut player) = self.players.get_mut(&id) {
            player.room_id = room_id;
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Roster sorted by id
    pub fn list(&self) -> Vec<PlayerInfo> {
        let mut list: Vec<PlayerInfo> = self.players.iter().map(|p| p.info()).collect();
        list.sort_by_key(|p| p.id);
        list
    }

    pub fn broadcast(&self, msg: &ServerMessage) {
        let connections: Vec<Connection> =
            self.players.iter().map(|p| p.connection.clone()).collect();
        for connection in connections {
            connection.send(msg);
        }
    }
}
