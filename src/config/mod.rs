//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation steps per second in every room
    pub tick_rate: u32,
    /// Sync broadcasts per second in every room
    pub broadcast_rate: u32,

    pub max_players: usize,
    pub max_rooms: usize,
    /// Players per room
    pub room_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            tick_rate: parse_or("TICK_RATE", 60)?,
            broadcast_rate: parse_or("BROADCAST_RATE", 20)?,

            max_players: parse_or("MAX_PLAYERS", 100)?,
            max_rooms: parse_or("MAX_ROOMS", 25)?,
            room_capacity: parse_or("ROOM_CAPACITY", 4)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ConfigError::OutOfRange("TICK_RATE"));
        }
        if self.broadcast_rate == 0 || self.broadcast_rate > self.tick_rate {
            return Err(ConfigError::OutOfRange("BROADCAST_RATE"));
        }
        if self.room_capacity == 0 {
            return Err(ConfigError::OutOfRange("ROOM_CAPACITY"));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Environment variable out of range: {0}")]
    OutOfRange(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
