//! Game simulation modules

pub mod combat;
pub mod events;
pub mod input;
pub mod math;
pub mod physics;
pub mod simulation;
pub mod state;

pub use events::{BusEvent, EventBus, StateEvent, StateEventKind, Subscription};
pub use input::{Input, InputKind};
pub use math::{Fixed, SeededRng, Vec2};
pub use simulation::SimulationState;
pub use state::{Actor, ActorKind, Bullet, BulletKind, Loadout, WeaponKind, WorldState};
