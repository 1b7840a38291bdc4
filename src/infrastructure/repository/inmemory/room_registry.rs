//! In-memory room registry.
//!
//! Owns the two global indices: `roomId -> Room` and `userId -> roomId`.
//! The single-room invariant (each user occupies at most one room, and
//! that room lists them) is enforced here, atomically with the room
//! mutation.
//!
//! Lock discipline: the registry mutex is acquired first, a room mutex
//! second, never the other way around. Callers that only need the room
//! get an `Arc` clone and lock it after the registry lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{
    LeaveOutcome, Player, Room, RoomId, RoomIdFactory, SessionError, UserId,
};

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<String, Arc<Mutex<Room>>>,
    room_by_user: HashMap<String, String>,
}

/// Registry of live rooms plus the user -> room index.
pub struct InMemoryRoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Destroy every room and index entry (test hook).
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.rooms.clear();
        inner.room_by_user.clear();
    }

    /// Create a room and seat `creator` in it.
    ///
    /// A client-supplied seed id is honored when free; a taken or absent
    /// seed falls back to generated ids until one is free.
    pub async fn create(
        &self,
        creator: Player,
        seed: Option<RoomId>,
    ) -> Result<(RoomId, Arc<Mutex<Room>>), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.room_by_user.contains_key(creator.user_id.as_str()) {
            return Err(SessionError::AlreadyInRoom);
        }

        let room_id = match seed {
            Some(id) if !inner.rooms.contains_key(id.as_str()) => id,
            _ => loop {
                let id = RoomIdFactory::generate().map_err(|_| SessionError::InvalidRoom)?;
                if !inner.rooms.contains_key(id.as_str()) {
                    break id;
                }
            },
        };

        let mut room = Room::new(room_id.clone());
        room.join(creator.clone())?;
        let room = Arc::new(Mutex::new(room));
        inner
            .rooms
            .insert(room_id.as_str().to_string(), room.clone());
        inner.room_by_user.insert(
            creator.user_id.as_str().to_string(),
            room_id.as_str().to_string(),
        );
        tracing::info!("Room {} created by '{}'", room_id, creator.user_id);
        Ok((room_id, room))
    }

    /// Seat `player` in `room_id`, updating the index atomically.
    ///
    /// Re-joining the current room is allowed (reconnect path); being in
    /// a different room is not.
    pub async fn join(
        &self,
        player: Player,
        room_id: &RoomId,
    ) -> Result<Arc<Mutex<Room>>, SessionError> {
        let mut inner = self.inner.lock().await;
        match inner.room_by_user.get(player.user_id.as_str()) {
            Some(current) if current != room_id.as_str() => {
                return Err(SessionError::LeaveCurrentRoomFirst);
            }
            _ => {}
        }
        let room = inner
            .rooms
            .get(room_id.as_str())
            .cloned()
            .ok_or(SessionError::RoomNotFound)?;
        {
            let mut guard = room.lock().await;
            guard.join(player.clone())?;
        }
        inner.room_by_user.insert(
            player.user_id.as_str().to_string(),
            room_id.as_str().to_string(),
        );
        Ok(room)
    }

    /// Remove the user from their room; destroys the room when it
    /// empties. Returns the room id, the leave outcome and the remaining
    /// occupants for notification.
    pub async fn leave(
        &self,
        user_id: &UserId,
        now: i64,
    ) -> Result<(RoomId, LeaveOutcome, Vec<Player>), SessionError> {
        let mut inner = self.inner.lock().await;
        let room_key = inner
            .room_by_user
            .remove(user_id.as_str())
            .ok_or(SessionError::NotInRoom)?;
        let room = inner
            .rooms
            .get(&room_key)
            .cloned()
            .ok_or(SessionError::RoomGone)?;

        let (room_id, outcome, remaining) = {
            let mut guard = room.lock().await;
            let outcome = guard.leave(user_id, now).ok_or(SessionError::NotInRoom)?;
            (guard.id().clone(), outcome, guard.players().to_vec())
        };
        if outcome.now_empty {
            inner.rooms.remove(&room_key);
            tracing::info!("Room {} destroyed (empty)", room_id);
        }
        Ok((room_id, outcome, remaining))
    }

    /// Current room of `user_id`, if any.
    pub async fn room_of_user(&self, user_id: &UserId) -> Option<(RoomId, Arc<Mutex<Room>>)> {
        let inner = self.inner.lock().await;
        let room_key = inner.room_by_user.get(user_id.as_str())?;
        let room = inner.rooms.get(room_key)?.clone();
        let room_id = RoomId::new(room_key.clone()).ok()?;
        Some((room_id, room))
    }

    /// Look up a room by id.
    pub async fn resolve(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>> {
        self.inner.lock().await.rooms.get(room_id.as_str()).cloned()
    }
}

impl Default for InMemoryRoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
