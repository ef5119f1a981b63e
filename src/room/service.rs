use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

use super::membership::MembershipStore;
use super::repository::RoomStore;
use crate::event::{Content, Event, EventStream, Membership, Message, RoomId, State, UserId};
use crate::shared::AppError;

/// A stored event together with the stream index it was pushed at
#[derive(Debug, Clone)]
pub struct Pushed<T> {
    pub event: T,
    pub index: u64,
}

/// Records room writes in the store and pushes them into the event stream
pub struct RoomService {
    room_store: Arc<dyn RoomStore + Send + Sync>,
    membership: Arc<dyn MembershipStore + Send + Sync>,
    stream: Arc<dyn EventStream + Send + Sync>,
}

impl RoomService {
    pub fn new(
        room_store: Arc<dyn RoomStore + Send + Sync>,
        membership: Arc<dyn MembershipStore + Send + Sync>,
        stream: Arc<dyn EventStream + Send + Sync>,
    ) -> Self {
        Self {
            room_store,
            membership,
            stream,
        }
    }

    /// Creates a room in `domain` with `creator` as its first member
    #[instrument(skip(self))]
    pub async fn create_room(&self, domain: &str, creator: &UserId) -> Result<RoomId, AppError> {
        let room_id = self.room_store.create_room(domain).await?;
        self.membership.create_room(&room_id).await?;

        self.set_state(
            &room_id,
            creator,
            Content::Create {
                creator: creator.clone(),
            },
            "",
        )
        .await?;
        self.join_room(&room_id, creator).await?;

        info!(room_id = %room_id, creator = %creator, "Room created");
        Ok(room_id)
    }

    /// Adds the user to the room, then records their `m.room.member` join
    #[instrument(skip(self))]
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Pushed<Arc<State>>, AppError> {
        // Joined first so the new member is woken by their own join
        self.membership.join(room_id, user_id).await?;
        self.set_state(
            room_id,
            user_id,
            Content::Member {
                membership: Membership::Join,
            },
            &user_id.to_string(),
        )
        .await
    }

    /// Records the user's `m.room.member` leave, then removes them from the room
    #[instrument(skip(self))]
    pub async fn leave_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Pushed<Arc<State>>, AppError> {
        let pushed = self
            .set_state(
                room_id,
                user_id,
                Content::Member {
                    membership: Membership::Leave,
                },
                &user_id.to_string(),
            )
            .await?;
        self.membership.leave(room_id, user_id).await?;
        Ok(pushed)
    }

    #[instrument(skip(self, content))]
    pub async fn send_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: Content,
    ) -> Result<Pushed<Arc<Message>>, AppError> {
        let message = self
            .room_store
            .add_room_message(room_id, user_id, content)
            .await?;
        let index = self.stream.push(Event::from(message.clone())).await?;

        Ok(Pushed {
            event: message,
            index,
        })
    }

    #[instrument(skip(self, content))]
    pub async fn set_state(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: Content,
        state_key: &str,
    ) -> Result<Pushed<Arc<State>>, AppError> {
        let state = self
            .room_store
            .set_room_state(room_id, user_id, content, state_key)
            .await?;
        let index = self.stream.push(Event::from(state.clone())).await?;

        Ok(Pushed {
            event: state,
            index,
        })
    }

    /// Rooms the user currently belongs to
    pub async fn rooms_of(&self, user_id: &UserId) -> Result<HashSet<RoomId>, AppError> {
        self.membership.rooms_of(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{IndexedEventStream, ListenOutcome, StreamMux};
    use crate::room::generators::RandomIdGenerator;
    use crate::room::membership::InMemoryMembershipStore;
    use crate::room::repository::InMemoryRoomStore;
    use std::future::pending;

    struct Fixture {
        service: RoomService,
        store: Arc<InMemoryRoomStore>,
        stream: Arc<IndexedEventStream>,
        mux: Arc<StreamMux>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRoomStore::new(Arc::new(RandomIdGenerator::default())));
        let membership = Arc::new(InMemoryMembershipStore::new());
        let mux = Arc::new(StreamMux::new());
        let stream = Arc::new(IndexedEventStream::new(membership.clone(), mux.clone()));

        Fixture {
            service: RoomService::new(store.clone(), membership, stream.clone()),
            store,
            stream,
            mux,
        }
    }

    fn user(name: &str) -> UserId {
        UserId::new(name, "test")
    }

    #[tokio::test]
    async fn test_create_room_records_create_and_join() {
        let f = fixture();
        let alice = user("alice");

        let room_id = f.service.create_room("test", &alice).await.unwrap();

        let events = f.store.room_events(&room_id).await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["m.room.create", "m.room.member"]);
        assert_eq!(f.stream.next_index().await, 2);
        assert!(f.service.rooms_of(&alice).await.unwrap().contains(&room_id));
    }

    #[tokio::test]
    async fn test_send_message_is_pushed_and_visible_in_range() {
        let f = fixture();
        let alice = user("alice");
        let room_id = f.service.create_room("test", &alice).await.unwrap();

        let pushed = f
            .service
            .send_message(&room_id, &alice, Content::text("hello"))
            .await
            .unwrap();
        assert_eq!(pushed.index, 2);

        let rooms = HashSet::from([room_id.clone()]);
        let result = f
            .stream
            .range(&alice, None, &rooms, 0, 10, 10)
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[2].event, Event::Message(pushed.event));
    }

    #[tokio::test]
    async fn test_members_are_woken_by_messages() {
        let f = fixture();
        let alice = user("alice");
        let bob = user("bob");
        let room_id = f.service.create_room("test", &alice).await.unwrap();
        f.service.join_room(&room_id, &bob).await.unwrap();

        let listener = f.mux.listen(bob.clone(), pending()).await;
        let pushed = f
            .service
            .send_message(&room_id, &alice, Content::text("hi bob"))
            .await
            .unwrap();

        match listener.recv().await {
            ListenOutcome::Delivered(event) => {
                assert_eq!(event.index, pushed.index);
                assert_eq!(event.event.sender(), &alice);
            }
            ListenOutcome::Cancelled => panic!("bob should have been woken"),
        }
    }

    #[tokio::test]
    async fn test_leaving_user_sees_own_leave_then_nothing() {
        let f = fixture();
        let alice = user("alice");
        let bob = user("bob");
        let room_id = f.service.create_room("test", &alice).await.unwrap();
        f.service.join_room(&room_id, &bob).await.unwrap();

        let listener = f.mux.listen(bob.clone(), pending()).await;
        let left = f.service.leave_room(&room_id, &bob).await.unwrap();

        match listener.recv().await {
            ListenOutcome::Delivered(event) => assert_eq!(event.index, left.index),
            ListenOutcome::Cancelled => panic!("bob should be woken by the leave"),
        }
        assert!(left.event.old_state.is_some());

        f.mux.listen(bob.clone(), pending()).await;
        f.service
            .send_message(&room_id, &alice, Content::text("bye"))
            .await
            .unwrap();
        assert_eq!(f.mux.pending_listeners(&bob).await, 1);
    }

    #[tokio::test]
    async fn test_join_unknown_room_is_not_found() {
        let f = fixture();
        let result = f
            .service
            .join_room(&RoomId::new("missing", "test"), &user("alice"))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(f.stream.next_index().await, 0);
    }
}
