//! World entities and the snapshot that holds them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::combat::MAX_HP;
use super::math::{Fixed, SeededRng, Vec2};

/// Body sprite selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Actor1,
    Actor2,
}

/// Weapon sprite selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Weapon1,
    Weapon2,
}

/// Bullet sprite selection, inherited by every bullet an actor fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletKind {
    Bullet1,
    Bullet2,
}

/// Matching body, weapon and bullet kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loadout {
    pub actor: ActorKind,
    pub weapon: WeaponKind,
    pub bullet: BulletKind,
}

impl Loadout {
    /// Loadouts alternate by seat so neighbours look different
    pub fn for_seat(seat: usize) -> Self {
        if seat % 2 == 0 {
            Self {
                actor: ActorKind::Actor1,
                weapon: WeaponKind::Weapon1,
                bullet: BulletKind::Bullet1,
            }
        } else {
            Self {
                actor: ActorKind::Actor2,
                weapon: WeaponKind::Weapon2,
                bullet: BulletKind::Bullet2,
            }
        }
    }
}

/// A participant's avatar (authoritative)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: u32,
    pub kind: ActorKind,
    pub weapon: WeaponKind,
    pub bullet: BulletKind,
    pub position: Vec2,
    pub direction: Vec2,
    /// Health (0-100), zero while waiting to respawn
    pub hp: u32,
    /// Damage dealt over the whole session, kept across respawns
    pub damage: u32,
    /// Seconds left before a dead actor respawns
    pub rebirth: Fixed,
    pub nickname: String,
}

impl Actor {
    pub fn new(
        id: u32,
        nickname: impl Into<String>,
        loadout: Loadout,
        position: Vec2,
        direction: Vec2,
    ) -> Self {
        Self {
            id,
            kind: loadout.actor,
            weapon: loadout.weapon,
            bullet: loadout.bullet,
            position,
            direction,
            hp: MAX_HP,
            damage: 0,
            rebirth: Fixed::ZERO,
            nickname: nickname.into(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// Projectile in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bullet {
    pub id: u32,
    pub owner: u32,
    pub kind: BulletKind,
    pub position: Vec2,
    pub direction: Vec2,
}

/// Complete simulation state. Dumping and loading it is lossless, the
/// generator seed included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    pub actors: BTreeMap<u32, Actor>,
    pub bullets: BTreeMap<u32, Bullet>,
    pub next_bullet_id: u32,
    #[serde(rename = "seed")]
    pub rng: SeededRng,
}

impl WorldState {
    pub fn new(seed: u32) -> Self {
        Self {
            actors: BTreeMap::new(),
            bullets: BTreeMap::new(),
            next_bullet_id: 1,
            rng: SeededRng::new(seed),
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(0)
    }
}
