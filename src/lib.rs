//! Authoritative core of a real-time top-down shooter
//!
//! - [`game`]: deterministic fixed-point simulation
//! - [`sync`]: authority and client prediction with rollback-replay
//! - [`ws`]: binary wire codec and websocket transport
//! - [`lobby`]: players, rooms and per-room tick loops

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod lobby;
pub mod sync;
pub mod util;
pub mod ws;
