//! Application state shared across routes

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::Config;
use crate::lobby::{LobbyConfig, LobbyService};
use crate::ws::connection::{Connection, ConnectionId};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: Arc<LobbyService>,
    /// Open websocket connections, logged in or not
    pub connections: Arc<DashMap<ConnectionId, Connection>>,
    pub next_connection_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let lobby = Arc::new(LobbyService::new(LobbyConfig::from_config(&config)));

        Self {
            config: Arc::new(config),
            lobby,
            connections: Arc::new(DashMap::new()),
            next_connection_id: Arc::new(AtomicU64::new(1)),
        }
    }
}
