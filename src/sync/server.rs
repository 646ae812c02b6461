//! Authoritative side of frame sync
//!
//! The authority buffers client inputs in arrival order, interleaves its own
//! `TimePast` steps, and on every flush applies the batch to the canonical
//! world and echoes it to every connection together with that connection's
//! highest acknowledged frame id.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use tracing::{debug, trace};

use crate::game::{Actor, Fixed, Input, Loadout, SimulationState, WorldState};
use crate::game::physics::{PhysicsSystem, SPAWN_RADIUS_MIN, SPAWN_RADIUS_SPAN};
use crate::ws::connection::ConnectionId;
use crate::ws::protocol::{ClientSync, ServerSync};

/// One seat at game start
#[derive(Debug, Clone)]
pub struct Seat {
    pub connection: ConnectionId,
    pub actor_id: u32,
    pub nickname: String,
}

#[derive(Debug, Clone, Copy)]
struct Peer {
    actor_id: u32,
    last_frame_id: u32,
}

#[derive(Debug, Clone, Copy)]
struct Buffered {
    source: Option<ConnectionId>,
    input: Input,
}

pub struct Authority {
    world: SimulationState,
    peers: BTreeMap<ConnectionId, Peer>,
    pending: Vec<Buffered>,
}

impl Authority {
    pub fn new(world: SimulationState) -> Self {
        Self {
            world,
            peers: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Seat every player on a ring around the centre and connect them.
    /// Placement draws come from the world generator, so the returned
    /// snapshot carries the seed clients continue from.
    pub fn start(seed: u32, seats: &[Seat]) -> Self {
        let mut world = WorldState::new(seed);
        let span = TAU / seats.len().max(1) as f64;

        for (index, seat) in seats.iter().enumerate() {
            let angle = (world.rng.next_f64() + index as f64) * span;
            let radius = SPAWN_RADIUS_MIN + world.rng.next_f64() * SPAWN_RADIUS_SPAN;
            let (position, direction) = PhysicsSystem::ring_spawn(angle, radius);
            world.actors.insert(
                seat.actor_id,
                Actor::new(
                    seat.actor_id,
                    seat.nickname.clone(),
                    Loadout::for_seat(index),
                    position,
                    direction,
                ),
            );
        }

        let mut authority = Self::new(SimulationState::from_snapshot(world));
        for seat in seats {
            authority.connect(seat.connection, seat.actor_id);
        }
        authority
    }

    pub fn world(&self) -> &SimulationState {
        &self.world
    }

    pub fn snapshot(&self) -> WorldState {
        self.world.dump()
    }

    pub fn connect(&mut self, connection: ConnectionId, actor_id: u32) {
        self.peers.insert(
            connection,
            Peer {
                actor_id,
                last_frame_id: 0,
            },
        );
    }

    /// Forget a connection: its acknowledgment state, its still-buffered
    /// inputs and its actor. Returns the removed actor id.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<u32> {
        let peer = self.peers.remove(&connection)?;
        let before = self.pending.len();
        self.pending.retain(|b| b.source != Some(connection));
        self.world.remove_actor(peer.actor_id);
        debug!(
            connection,
            actor_id = peer.actor_id,
            discarded = before - self.pending.len(),
            "Peer disconnected"
        );
        Some(peer.actor_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffer a client input. Frames from unknown connections are dropped.
    pub fn receive(&mut self, connection: ConnectionId, sync: ClientSync) -> bool {
        let Some(peer) = self.peers.get_mut(&connection) else {
            debug!(connection, frame_id = sync.frame_id, "Sync from unknown peer dropped");
            return false;
        };
        peer.last_frame_id = peer.last_frame_id.max(sync.frame_id);
        self.pending.push(Buffered {
            source: Some(connection),
            input: sync.input,
        });
        true
    }

    /// Buffer one server clock step
    pub fn simulate(&mut self, dt: Fixed) {
        self.pending.push(Buffered {
            source: None,
            input: Input::TimePast { dt },
        });
    }

    /// Apply the buffered batch and build one sync message per connection.
    /// An empty batch still produces messages so acknowledgments keep
    /// flowing.
    pub fn flush(&mut self) -> Vec<(ConnectionId, ServerSync)> {
        let inputs: Vec<Input> = self.pending.drain(..).map(|b| b.input).collect();
        for input in &inputs {
            self.world.apply_input(input);
        }
        trace!(inputs = inputs.len(), peers = self.peers.len(), "Flushed batch");

        self.peers
            .iter()
            .map(|(&connection, peer)| {
                (
                    connection,
                    ServerSync {
                        last_frame_id: peer.last_frame_id,
                        inputs: inputs.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Vec2;

    fn seats(n: u32) -> Vec<Seat> {
        (1..=n)
            .map(|id| Seat {
                connection: id as ConnectionId * 10,
                actor_id: id,
                nickname: format!("p{id}"),
            })
            .collect()
    }

    fn step(actor_id: u32) -> Input {
        Input::ActorMove {
            actor_id,
            direction: Vec2::new(Fixed::from_int(1), Fixed::ZERO),
            dt: Fixed::from_raw(100),
        }
    }

    #[test]
    fn start_places_every_seat_and_is_reproducible() {
        let a = Authority::start(99, &seats(4));
        let b = Authority::start(99, &seats(4));
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.snapshot().actors.len(), 4);
        assert_eq!(a.peer_count(), 4);
        assert_ne!(a.snapshot().rng, WorldState::new(99).rng);

        for actor in a.snapshot().actors.values() {
            let (x, y) = actor.position.to_f64();
            let distance = (x * x + y * y).sqrt();
            assert!((319.0..=641.0).contains(&distance), "{distance}");
        }
    }

    #[test]
    fn flush_acks_each_recipient_separately() {
        let mut authority = Authority::start(1, &seats(2));
        authority.receive(10, ClientSync { frame_id: 3, input: step(1) });
        authority.receive(10, ClientSync { frame_id: 2, input: step(1) });
        authority.simulate(Fixed::from_raw(16));

        let out = authority.flush();
        assert_eq!(out.len(), 2);
        let (first, second) = (&out[0], &out[1]);
        assert_eq!(first.0, 10);
        assert_eq!(first.1.last_frame_id, 3);
        assert_eq!(second.0, 20);
        assert_eq!(second.1.last_frame_id, 0);
        assert_eq!(first.1.inputs, second.1.inputs);
        assert_eq!(first.1.inputs.len(), 3);
        assert_eq!(authority.pending_len(), 0);
    }

    #[test]
    fn flush_applies_batch_in_arrival_order() {
        let mut authority = Authority::start(5, &seats(1));
        let mut mirror = SimulationState::from_snapshot(authority.snapshot());

        authority.receive(10, ClientSync { frame_id: 1, input: step(1) });
        authority.simulate(Fixed::from_raw(17));
        authority.receive(10, ClientSync { frame_id: 2, input: step(1) });
        let out = authority.flush();

        for input in &out[0].1.inputs {
            mirror.apply_input(input);
        }
        assert_eq!(mirror.dump(), authority.snapshot());
    }

    #[test]
    fn empty_flush_still_acks() {
        let mut authority = Authority::start(1, &seats(1));
        authority.receive(10, ClientSync { frame_id: 7, input: step(1) });
        authority.flush();

        let out = authority.flush();
        assert_eq!(out[0].1.last_frame_id, 7);
        assert!(out[0].1.inputs.is_empty());
    }

    #[test]
    fn disconnect_discards_buffered_inputs_and_actor() {
        let mut authority = Authority::start(1, &seats(2));
        authority.receive(10, ClientSync { frame_id: 1, input: step(1) });
        authority.simulate(Fixed::from_raw(16));
        authority.receive(20, ClientSync { frame_id: 1, input: step(2) });

        assert_eq!(authority.disconnect(10), Some(1));
        assert_eq!(authority.disconnect(10), None);
        assert_eq!(authority.pending_len(), 2);
        assert!(authority.world().actor(1).is_none());

        let out = authority.flush();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.inputs[0], Input::TimePast { dt: Fixed::from_raw(16) });
    }

    #[test]
    fn unknown_connection_is_ignored() {
        let mut authority = Authority::start(1, &seats(1));
        assert!(!authority.receive(99, ClientSync { frame_id: 1, input: step(1) }));
        assert_eq!(authority.pending_len(), 0);
    }
}
