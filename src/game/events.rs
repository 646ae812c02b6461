//! Typed publish/subscribe shared by injection
//!
//! One bus type serves every event family: the family names its key type,
//! handlers subscribe per key, and clones of a bus share one registry.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::math::Vec2;

/// An event family routable by key
pub trait BusEvent {
    type Key: Copy + Eq + Hash + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription<K> {
    key: K,
    id: u64,
}

struct Registry<E: BusEvent> {
    next_id: u64,
    handlers: HashMap<E::Key, Vec<(u64, Handler<E>)>>,
}

pub struct EventBus<E: BusEvent> {
    registry: Arc<RwLock<Registry<E>>>,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                next_id: 1,
                handlers: HashMap::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, key: E::Key, handler: F) -> Subscription<E::Key>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.registry.write();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .handlers
            .entry(key)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { key, id }
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, subscription: &Subscription<E::Key>) -> bool {
        let mut registry = self.registry.write();
        let Some(list) = registry.handlers.get_mut(&subscription.key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        before != list.len()
    }

    /// Deliver to every handler of the event's key, in subscription order.
    /// Handlers run outside the registry lock and may (un)subscribe.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .registry
            .read()
            .handlers
            .get(&event.key())
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn listener_count(&self, key: E::Key) -> usize {
        self.registry
            .read()
            .handlers
            .get(&key)
            .map_or(0, |list| list.len())
    }

    pub fn clear(&self) {
        self.registry.write().handlers.clear();
    }
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifications raised by the simulation for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Bullet exploded, on a hit or at the stage edge
    ExplosionBorn { bullet_id: u32, position: Vec2 },
    /// Bullet damaged an actor
    DamageBorn {
        actor_id: u32,
        source_id: u32,
        damage: u32,
        critical: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateEventKind {
    ExplosionBorn,
    DamageBorn,
}

impl BusEvent for StateEvent {
    type Key = StateEventKind;

    fn key(&self) -> StateEventKind {
        match self {
            StateEvent::ExplosionBorn { .. } => StateEventKind::ExplosionBorn,
            StateEvent::DamageBorn { .. } => StateEventKind::DamageBorn,
        }
    }
}
