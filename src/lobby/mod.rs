//! Lobby - player roster, rooms and game start

pub mod players;
pub mod room;
pub mod rooms;
pub mod service;

pub use players::PlayerRegistry;
pub use room::{RoomCommand, RoomGame, RoomHandle};
pub use rooms::RoomRegistry;
pub use service::LobbyService;

use crate::config::Config;

/// Lobby limits and game timing
#[derive(Debug, Clone, Copy)]
pub struct LobbyConfig {
    pub max_players: usize,
    pub max_rooms: usize,
    pub room_capacity: usize,
    pub tick_rate: u32,
    pub broadcast_rate: u32,
}

impl LobbyConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_players: config.max_players,
            max_rooms: config.max_rooms,
            room_capacity: config.room_capacity,
            tick_rate: config.tick_rate,
            broadcast_rate: config.broadcast_rate,
        }
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: 100,
            max_rooms: 25,
            room_capacity: 4,
            tick_rate: 60,
            broadcast_rate: 20,
        }
    }
}

/// Rejected lobby calls; the message is sent back to the caller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("nickname must not be empty")]
    EmptyNickname,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("nickname {0} is taken")]
    NicknameTaken(String),

    #[error("server is full")]
    ServerFull,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("room {0} not found")]
    RoomNotFound(u32),

    #[error("room is full")]
    RoomFull,

    #[error("too many rooms")]
    TooManyRooms,

    #[error("already in a room")]
    AlreadyInRoom,

    #[error("not in a room")]
    NotInRoom,

    #[error("only the room owner can do that")]
    NotOwner,

    #[error("game already running")]
    GameRunning,
}
