use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use roomstream::{
    room::generators::RandomIdGenerator, AppError, Content, Event, EventId, EventStream,
    InMemoryMembershipStore, InMemoryRoomStore, IndexedEvent, IndexedEventStream,
    MembershipStore, Message, Notifier, RoomId, RoomService, StreamMux, UserId,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

#[allow(dead_code)]
pub struct TestSetup {
    pub membership: Arc<InMemoryMembershipStore>,
    pub mux: Arc<StreamMux>,
    pub stream: Arc<IndexedEventStream>,
    pub room_store: Arc<InMemoryRoomStore>,
    pub service: RoomService,
    pub room: RoomId,
    pub reader: UserId,
}

impl TestSetup {
    /// Pushes a message with a caller-chosen event id into the setup's room
    #[allow(dead_code)]
    pub async fn push(&self, event_id: &str, tag: &str) -> Result<u64, AppError> {
        self.stream.push(message(&self.room, event_id, tag)).await
    }

    /// Range over the setup's room as its reader, returning content tags
    #[allow(dead_code)]
    pub async fn range_tags(&self, from: u64, to: u64, limit: usize) -> Vec<String> {
        let rooms = HashSet::from([self.room.clone()]);
        self.stream
            .range(&self.reader, None, &rooms, from, to, limit)
            .await
            .expect("range should succeed")
            .iter()
            .map(tag_of)
            .collect()
    }
}

pub struct TestSetupBuilder {
    members: Vec<String>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            members: vec!["test".to_string()],
            notifier: None,
        }
    }

    /// First member becomes the setup's reader
    #[allow(dead_code)]
    pub fn with_members(mut self, members: Vec<&str>) -> Self {
        self.members = members.into_iter().map(|s| s.to_string()).collect();
        self
    }

    /// Replaces the multiplexer as the stream's notifier
    #[allow(dead_code)]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub async fn build(self) -> TestSetup {
        let membership = Arc::new(InMemoryMembershipStore::new());
        let mux = Arc::new(StreamMux::new());
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => mux.clone(),
        };
        let stream = Arc::new(IndexedEventStream::new(membership.clone(), notifier));
        let room_store = Arc::new(InMemoryRoomStore::new(Arc::new(
            RandomIdGenerator::default(),
        )));
        let service = RoomService::new(room_store.clone(), membership.clone(), stream.clone());

        let room = RoomId::new("room", "test");
        membership
            .create_room(&room)
            .await
            .expect("room registration should succeed");
        for member in &self.members {
            membership
                .join(&room, &UserId::new(member.as_str(), "test"))
                .await
                .expect("join should succeed");
        }

        TestSetup {
            membership,
            mux,
            stream,
            room_store,
            service,
            room,
            reader: UserId::new(self.members[0].as_str(), "test"),
        }
    }
}

// ============================================================================
// Event helpers
// ============================================================================

/// An `m.room.create` message whose creator doubles as a content tag
pub fn message(room: &RoomId, event_id: &str, tag: &str) -> Event {
    Event::from(Message::new(
        EventId::new(event_id, "test"),
        room.clone(),
        UserId::new(tag, "test"),
        Content::Create {
            creator: UserId::new(tag, "test"),
        },
    ))
}

pub fn tag_of(event: &IndexedEvent) -> String {
    match event.event.content() {
        Content::Create { creator } => creator.local().to_string(),
        other => panic!("unexpected content {other:?}"),
    }
}

/// Notifier that always fails, for checking error propagation from push
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _user_ids: &[UserId], _event: &IndexedEvent) -> Result<(), AppError> {
        Err(AppError::Internal("notifier unavailable".to_string()))
    }
}
