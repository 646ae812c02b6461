//! Inputs that drive the simulation

use serde::{Deserialize, Serialize};

use super::math::{Fixed, Vec2};

/// One step of player or server intent. Applying the same ordered sequence
/// of inputs to the same snapshot always yields the same world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    /// Move an actor along `direction` for `dt` seconds
    ActorMove {
        actor_id: u32,
        direction: Vec2,
        dt: Fixed,
    },
    /// Spawn a bullet owned by `owner_id`
    WeaponShoot {
        owner_id: u32,
        position: Vec2,
        direction: Vec2,
    },
    /// Server clock advanced by `dt` seconds
    TimePast { dt: Fixed },
}

impl Input {
    pub fn kind(&self) -> InputKind {
        match self {
            Input::ActorMove { .. } => InputKind::ActorMove,
            Input::WeaponShoot { .. } => InputKind::WeaponShoot,
            Input::TimePast { .. } => InputKind::TimePast,
        }
    }

    /// Whether a locally predicted copy of this input must be replayed after
    /// a rollback. Shots are fire-and-forget.
    pub fn is_replayable(&self) -> bool {
        matches!(self, Input::ActorMove { .. })
    }
}

/// Discriminant written as the first byte of every input record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InputKind {
    ActorMove = 0,
    WeaponShoot = 1,
    TimePast = 2,
}

impl InputKind {
    /// Full record length on the wire, tag byte included
    pub const fn record_len(self) -> usize {
        match self {
            InputKind::ActorMove => 17,
            InputKind::WeaponShoot => 21,
            InputKind::TimePast => 5,
        }
    }
}

impl TryFrom<u8> for InputKind {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(InputKind::ActorMove),
            1 => Ok(InputKind::WeaponShoot),
            2 => Ok(InputKind::TimePast),
            other => Err(other),
        }
    }
}
