use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::event::{RoomId, UserId};
use crate::shared::AppError;

/// Tracks which users belong to which rooms
///
/// The stream only needs `members_of`: it decides who is woken on push and
/// who may see an event in a range query.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Makes a room known with no members. Idempotent.
    async fn create_room(&self, room_id: &RoomId) -> Result<(), AppError>;

    /// Returns true if the user was not already a member
    async fn join(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, AppError>;

    /// Returns true if the user was a member
    async fn leave(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, AppError>;

    /// Fails with `NotFound` for a room this store has never seen
    async fn members_of(&self, room_id: &RoomId) -> Result<HashSet<UserId>, AppError>;

    async fn rooms_of(&self, user_id: &UserId) -> Result<HashSet<RoomId>, AppError>;
}

/// In-memory implementation of MembershipStore
#[derive(Default)]
pub struct InMemoryMembershipStore {
    rooms: RwLock<HashMap<RoomId, HashSet<UserId>>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    #[instrument(skip(self))]
    async fn create_room(&self, room_id: &RoomId) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id.clone()).or_default();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn join(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, AppError> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.get_mut(room_id).ok_or_else(|| {
            warn!(room_id = %room_id, "Join for unknown room");
            AppError::room_not_found(room_id)
        })?;

        let joined = members.insert(user_id.clone());
        debug!(room_id = %room_id, user_id = %user_id, joined, "Membership join");
        Ok(joined)
    }

    #[instrument(skip(self))]
    async fn leave(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, AppError> {
        let mut rooms = self.rooms.write().await;
        let members = rooms
            .get_mut(room_id)
            .ok_or_else(|| AppError::room_not_found(room_id))?;

        let left = members.remove(user_id);
        debug!(room_id = %room_id, user_id = %user_id, left, "Membership leave");
        Ok(left)
    }

    async fn members_of(&self, room_id: &RoomId) -> Result<HashSet<UserId>, AppError> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| AppError::room_not_found(room_id))
    }

    async fn rooms_of(&self, user_id: &UserId) -> Result<HashSet<RoomId>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .iter()
            .filter(|(_, members)| members.contains(user_id))
            .map(|(room_id, _)| room_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_and_leave() {
        let store = InMemoryMembershipStore::new();
        let room = RoomId::new("room", "test");
        let alice = UserId::new("alice", "test");

        store.create_room(&room).await.unwrap();
        assert!(store.members_of(&room).await.unwrap().is_empty());

        assert!(store.join(&room, &alice).await.unwrap());
        assert!(!store.join(&room, &alice).await.unwrap());
        assert!(store.members_of(&room).await.unwrap().contains(&alice));
        assert!(store.rooms_of(&alice).await.unwrap().contains(&room));

        assert!(store.leave(&room, &alice).await.unwrap());
        assert!(!store.leave(&room, &alice).await.unwrap());
        assert!(store.rooms_of(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let store = InMemoryMembershipStore::new();
        let room = RoomId::new("missing", "test");
        let alice = UserId::new("alice", "test");

        assert!(matches!(
            store.members_of(&room).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.join(&room, &alice).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_room_is_idempotent() {
        let store = InMemoryMembershipStore::new();
        let room = RoomId::new("room", "test");
        let alice = UserId::new("alice", "test");

        store.create_room(&room).await.unwrap();
        store.join(&room, &alice).await.unwrap();
        store.create_room(&room).await.unwrap();

        assert_eq!(store.members_of(&room).await.unwrap().len(), 1);
    }
}
