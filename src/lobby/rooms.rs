//! Room membership

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tracing::info;

use crate::ws::connection::ConnectionId;

use super::room::RoomHandle;
use super::LobbyError;

pub struct Room {
    pub id: u32,
    pub name: String,
    pub owner: u32,
    /// Player ids in join order; seats follow this order
    pub members: Vec<u32>,
    pub game: Option<RoomHandle>,
}

impl Room {
    pub fn is_running(&self) -> bool {
        self.game.as_ref().is_some_and(RoomHandle::is_running)
    }
}

/// What changed when a player left a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// Room is gone
    Closed,
    /// Room lives on, possibly under a new owner
    Remaining { owner: u32 },
}

pub struct RoomRegistry {
    rooms: DashMap<u32, Room>,
    next_id: AtomicU32,
    max_rooms: usize,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new(max_rooms: usize, capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            next_id: AtomicU32::new(1),
            max_rooms,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a room with `owner` as its only member
    pub fn create(&self, owner: u32, owner_nickname: &str) -> Result<u32, LobbyError> {
        if self.rooms.len() >= self.max_rooms {
            return Err(LobbyError::TooManyRooms);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.rooms.insert(
            id,
            Room {
                id,
                name: format!("{owner_nickname}'s room"),
                owner,
                members: vec![owner],
                game: None,
            },
        );
        info!(room_id = id, owner, "Room created");
        Ok(id)
    }

    pub fn join(&self, room_id: u32, player: u32) -> Result<(), LobbyError> {
        let mut room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(LobbyError::RoomNotFound(room_id))?;
        if room.is_running() {
            return Err(LobbyError::GameRunning);
        }
        if room.members.len() >= self.capacity {
            return Err(LobbyError::RoomFull);
        }
        if !room.members.contains(&player) {
            room.members.push(player);
        }
        Ok(())
    }

    /// Remove `player`; an emptied room is closed and ownership passes to
    /// the earliest remaining member. A running game is told about the
    /// leaver through its handle.
    pub fn leave(&self, room_id: u32, player: u32, connection: ConnectionId) -> Option<Departure> {
        let departure = {
            let mut room = self.rooms.get_mut(&room_id)?;
            let before = room.members.len();
            room.members.retain(|&m| m != player);
            if room.members.len() == before {
                return None;
            }
            if let Some(game) = &room.game {
                game.leave(connection);
            }
            match room.members.first().copied() {
                None => Departure::Closed,
                Some(next) => {
                    if room.owner == player {
                        room.owner = next;
                    }
                    Departure::Remaining { owner: room.owner }
                }
            }
        };

        if departure == Departure::Closed {
            if let Some((_, room)) = self.rooms.remove(&room_id) {
                if let Some(game) = room.game {
                    game.stop();
                }
            }
            info!(room_id, "Room closed");
        }
        Some(departure)
    }

    /// Check that `player` may start the game in `room_id` and return the
    /// seating order
    pub fn prepare_start(&self, room_id: u32, player: u32) -> Result<Vec<u32>, LobbyError> {
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(LobbyError::RoomNotFound(room_id))?;
        if room.owner != player {
            return Err(LobbyError::NotOwner);
        }
        if room.is_running() {
            return Err(LobbyError::GameRunning);
        }
        Ok(room.members.clone())
    }

    pub fn attach_game(&self, room_id: u32, handle: RoomHandle) {
        if let Some(mut room) = self.rooms.get_mut(&room_id) {
            room.game = Some(handle);
        }
    }

    /// Read access to one room
    pub fn with_room<T>(&self, room_id: u32, f: impl FnOnce(&Room) -> T) -> Option<T> {
        self.rooms.get(&room_id).map(|room| f(room.value()))
    }

    /// Room ids in ascending order
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.rooms.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.rooms.iter().filter(|r| r.is_running()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_respects_room_limit() {
        let rooms = RoomRegistry::new(2, 4);
        assert_eq!(rooms.create(1, "a"), Ok(1));
        assert_eq!(rooms.create(2, "b"), Ok(2));
        assert_eq!(rooms.create(3, "c"), Err(LobbyError::TooManyRooms));
        assert_eq!(rooms.ids(), vec![1, 2]);
    }

    #[test]
    fn join_checks_existence_and_capacity() {
        let rooms = RoomRegistry::new(5, 2);
        let id = rooms.create(1, "a").unwrap();

        assert_eq!(rooms.join(99, 2), Err(LobbyError::RoomNotFound(99)));
        assert_eq!(rooms.join(id, 2), Ok(()));
        assert_eq!(rooms.join(id, 3), Err(LobbyError::RoomFull));
        assert_eq!(rooms.with_room(id, |r| r.members.clone()), Some(vec![1, 2]));
    }

    #[test]
    fn owner_leaving_hands_over_and_last_leave_closes() {
        let rooms = RoomRegistry::new(5, 4);
        let id = rooms.create(1, "a").unwrap();
        rooms.join(id, 2).unwrap();
        rooms.join(id, 3).unwrap();

        assert_eq!(rooms.leave(id, 1, 10), Some(Departure::Remaining { owner: 2 }));
        assert_eq!(rooms.leave(id, 1, 10), None);
        assert_eq!(rooms.leave(id, 3, 30), Some(Departure::Remaining { owner: 2 }));
        assert_eq!(rooms.leave(id, 2, 20), Some(Departure::Closed));
        assert!(rooms.is_empty());
    }

    #[test]
    fn only_the_owner_may_start() {
        let rooms = RoomRegistry::new(5, 4);
        let id = rooms.create(1, "a").unwrap();
        rooms.join(id, 2).unwrap();

        assert_eq!(rooms.prepare_start(id, 2), Err(LobbyError::NotOwner));
        assert_eq!(rooms.prepare_start(id, 1), Ok(vec![1, 2]));
        assert_eq!(rooms.prepare_start(7, 1), Err(LobbyError::RoomNotFound(7)));
    }
}
