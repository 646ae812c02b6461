//! Deterministic world simulation
//!
//! `SimulationState` is a pure function of its snapshot and the ordered
//! inputs applied to it. Every random decision consumes exactly one draw
//! from the snapshot's generator, in this order per `TimePast`:
//!
//! 1. actors by ascending id: respawn angle, then respawn radius
//! 2. bullets by ascending id: one crit roll per hit

use std::f64::consts::TAU;

use tracing::trace;

use super::combat::{CombatSystem, HitResult, MAX_HP, REBIRTH_TIME};
use super::events::{EventBus, StateEvent};
use super::input::Input;
use super::math::{Fixed, Vec2};
use super::physics::{PhysicsSystem, SPAWN_RADIUS_MIN, SPAWN_RADIUS_SPAN};
use super::state::{Actor, Bullet, WorldState};

pub struct SimulationState {
    world: WorldState,
    events: Option<EventBus<StateEvent>>,
}

impl SimulationState {
    pub fn new(seed: u32) -> Self {
        Self::from_snapshot(WorldState::new(seed))
    }

    pub fn from_snapshot(world: WorldState) -> Self {
        Self {
            world,
            events: None,
        }
    }

    /// Publish explosion and damage notifications to `bus`
    pub fn with_events(mut self, bus: EventBus<StateEvent>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn events(&self) -> Option<&EventBus<StateEvent>> {
        self.events.as_ref()
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn actor(&self, id: u32) -> Option<&Actor> {
        self.world.actors.get(&id)
    }

    /// Returns false and leaves the world untouched if the id is taken
    pub fn add_actor(&mut self, actor: Actor) -> bool {
        if self.world.actors.contains_key(&actor.id) {
            return false;
        }
        self.world.actors.insert(actor.id, actor);
        true
    }

    pub fn remove_actor(&mut self, id: u32) -> Option<Actor> {
        self.world.actors.remove(&id)
    }

    pub fn apply_input(&mut self, input: &Input) {
        match *input {
            Input::ActorMove {
                actor_id,
                direction,
                dt,
            } => self.apply_actor_move(actor_id, direction, dt),
            Input::WeaponShoot {
                owner_id,
                position,
                direction,
            } => self.apply_weapon_shoot(owner_id, position, direction),
            Input::TimePast { dt } => self.apply_time_past(dt),
        }
    }

    pub fn dump(&self) -> WorldState {
        self.world.clone()
    }

    pub fn load(&mut self, snapshot: &WorldState) {
        self.world = snapshot.clone();
    }

    /// Empty world; the event sink stays attached
    pub fn reset(&mut self) {
        self.world = WorldState::default();
    }

    fn apply_actor_move(&mut self, actor_id: u32, direction: Vec2, dt: Fixed) {
        let blockers: Vec<Vec2> = self
            .world
            .actors
            .values()
            .filter(|other| other.id != actor_id && other.is_alive())
            .map(|other| other.position)
            .collect();

        let Some(actor) = self.world.actors.get_mut(&actor_id) else {
            return;
        };
        if !actor.is_alive() {
            return;
        }

        actor.direction = direction;

        let mut position = PhysicsSystem::integrate(actor.position, direction, dt);
        for blocker in blockers {
            position = PhysicsSystem::resolve_actor_collision(position, blocker);
        }
        actor.position = PhysicsSystem::clamp_to_stage(position);
    }

    fn apply_weapon_shoot(&mut self, owner_id: u32, position: Vec2, direction: Vec2) {
        let Some(owner) = self.world.actors.get(&owner_id) else {
            return;
        };
        if !owner.is_alive() {
            return;
        }
        let kind = owner.bullet;

        let id = self.world.next_bullet_id;
        self.world.next_bullet_id += 1;
        let bullet = Bullet {
            id,
            owner: owner_id,
            kind,
            position,
            direction,
        };
        self.world.bullets.insert(id, bullet);
    }

    fn apply_time_past(&mut self, dt: Fixed) {
        self.tick_rebirth(dt);
        let events = self.tick_bullets(dt);

        if let Some(bus) = &self.events {
            for event in &events {
                bus.emit(event);
            }
        }
    }

    fn tick_rebirth(&mut self, dt: Fixed) {
        let WorldState { actors, rng, .. } = &mut self.world;

        for actor in actors.values_mut() {
            if actor.rebirth.is_positive() {
                actor.rebirth = (actor.rebirth - dt).max(Fixed::ZERO);
            } else if actor.hp == 0 {
                let angle = rng.next_f64() * TAU;
                let radius = SPAWN_RADIUS_MIN + rng.next_f64() * SPAWN_RADIUS_SPAN;
                let (position, facing) = PhysicsSystem::ring_spawn(angle, radius);

                actor.hp = MAX_HP;
                actor.rebirth = Fixed::ZERO;
                actor.position = position;
                actor.direction = facing;
                trace!(actor_id = actor.id, "actor respawned");
            }
        }
    }

    fn tick_bullets(&mut self, dt: Fixed) -> Vec<StateEvent> {
        let mut events = Vec::new();
        let ids: Vec<u32> = self.world.bullets.keys().copied().collect();

        for bullet_id in ids {
            let Some(bullet) = self.world.bullets.get(&bullet_id).cloned() else {
                continue;
            };

            if let Some(hit) = self.resolve_hit(&bullet) {
                self.world.bullets.remove(&bullet_id);
                events.push(StateEvent::ExplosionBorn {
                    bullet_id,
                    position: hit.position,
                });
                events.push(StateEvent::DamageBorn {
                    actor_id: hit.target_id,
                    source_id: hit.shooter_id,
                    damage: hit.damage,
                    critical: hit.critical,
                });
                continue;
            }

            if !PhysicsSystem::is_on_stage(bullet.position) {
                self.world.bullets.remove(&bullet_id);
                events.push(StateEvent::ExplosionBorn {
                    bullet_id,
                    position: bullet.position,
                });
                continue;
            }

            if let Some(bullet) = self.world.bullets.get_mut(&bullet_id) {
                bullet.advance(dt);
            }
        }

        events
    }

    /// First live non-owner actor within hit range takes the damage
    fn resolve_hit(&mut self, bullet: &Bullet) -> Option<HitResult> {
        let target_id = self
            .world
            .actors
            .values()
            .find(|actor| {
                actor.id != bullet.owner && actor.is_alive() && bullet.check_hit(actor.position)
            })?
            .id;

        let (damage, critical) = CombatSystem::roll_damage(&mut self.world.rng);

        let mut target_killed = false;
        if let Some(target) = self.world.actors.get_mut(&target_id) {
            let (hp, killed) = CombatSystem::apply_damage(target.hp, damage);
            target.hp = hp;
            if killed {
                target.rebirth = REBIRTH_TIME;
                target_killed = true;
            }
        }

        if let Some(shooter) = self.world.actors.get_mut(&bullet.owner) {
            shooter.damage = shooter.damage.saturating_add(damage);
        }

        trace!(
            bullet_id = bullet.id,
            target_id,
            damage,
            critical,
            target_killed,
            "bullet hit"
        );

        Some(HitResult {
            shooter_id: bullet.owner,
            target_id,
            damage,
            critical,
            position: bullet.position,
        })
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new(0)
    }
}
