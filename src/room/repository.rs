use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::generators::IdGenerator;
use crate::event::{Content, Event, EventId, Message, RoomId, State, StateId, UserId};
use crate::shared::AppError;

/// Attempts at finding an unused random id before giving up
const MAX_ID_ATTEMPTS: usize = 64;

/// Trait for room and state storage operations
#[async_trait]
pub trait RoomStore {
    /// Creates an empty room with a fresh id in `domain`
    async fn create_room(&self, domain: &str) -> Result<RoomId, AppError>;

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, AppError>;

    /// Appends a message with a fresh event id to the room's timeline
    async fn add_room_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: Content,
    ) -> Result<Arc<Message>, AppError>;

    /// Replaces the current state in the `(content type, state_key)` slot,
    /// linking the new state to the one it replaces
    async fn set_room_state(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: Content,
        state_key: &str,
    ) -> Result<Arc<State>, AppError>;

    /// `Err(NotFound)` if the room doesn't exist, `Ok(None)` if the slot is empty
    async fn room_state(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<Arc<State>>, AppError>;

    /// Current state of every slot in the room
    async fn entire_room_state(&self, room_id: &RoomId) -> Result<Vec<Arc<State>>, AppError>;

    /// Every event recorded in the room, oldest first
    async fn room_events(&self, room_id: &RoomId) -> Result<Vec<Event>, AppError>;

    async fn get_event(&self, event_id: &EventId) -> Result<Option<Event>, AppError>;
}

/// A room's timeline and current state slots.
/// Lock `events` before `states`.
struct RoomRecord {
    events: RwLock<Vec<Event>>,
    states: RwLock<HashMap<StateId, Arc<State>>>,
}

impl RoomRecord {
    fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            states: RwLock::new(HashMap::new()),
        }
    }
}

/// In-memory implementation of RoomStore
///
/// Locks are always acquired in this order: `rooms`, `events`, then a single
/// room's `events` and `states`. Id minting holds the lock of the table it
/// checks for the whole check-then-insert.
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Arc<RoomRecord>>>,
    events: RwLock<HashMap<EventId, Event>>,
    id_generator: Arc<dyn IdGenerator>,
}

impl InMemoryRoomStore {
    pub fn new(id_generator: Arc<dyn IdGenerator>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            id_generator,
        }
    }

    /// Generates ids until one is not taken according to `taken`
    fn mint<T>(
        &self,
        build: impl Fn(String) -> T,
        taken: impl Fn(&T) -> bool,
    ) -> Result<T, AppError> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = build(self.id_generator.generate());
            if !taken(&id) {
                return Ok(id);
            }
            debug!(attempt, "Generated id collided, retrying");
        }

        warn!(attempts = MAX_ID_ATTEMPTS, "Could not mint an unused id");
        Err(AppError::Internal("id space exhausted".to_string()))
    }

    /// Looks up a room while the caller holds the room table lock
    fn room<'a>(
        rooms: &'a HashMap<RoomId, Arc<RoomRecord>>,
        room_id: &RoomId,
    ) -> Result<&'a Arc<RoomRecord>, AppError> {
        rooms.get(room_id).ok_or_else(|| {
            debug!(room_id = %room_id, "Room not found in memory");
            AppError::room_not_found(room_id)
        })
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    #[instrument(skip(self))]
    async fn create_room(&self, domain: &str) -> Result<RoomId, AppError> {
        let mut rooms = self.rooms.write().await;
        let room_id = self.mint(
            |local| RoomId::new(local, domain),
            |id| rooms.contains_key(id),
        )?;
        rooms.insert(room_id.clone(), Arc::new(RoomRecord::new()));

        info!(room_id = %room_id, "Room created in memory");
        Ok(room_id)
    }

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.contains_key(room_id))
    }

    #[instrument(skip(self, content), fields(event_type = content.event_type()))]
    async fn add_room_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: Content,
    ) -> Result<Arc<Message>, AppError> {
        let rooms = self.rooms.read().await;
        let room = Self::room(&rooms, room_id)?;

        let mut events = self.events.write().await;
        let event_id = self.mint(
            |local| EventId::new(local, user_id.domain()),
            |id| events.contains_key(id),
        )?;

        let message = Arc::new(Message::new(
            event_id.clone(),
            room_id.clone(),
            user_id.clone(),
            content,
        ));
        events.insert(event_id.clone(), Event::from(message.clone()));

        let mut room_events = room.events.write().await;
        room_events.push(Event::from(message.clone()));

        debug!(event_id = %event_id, "Message added to room");
        Ok(message)
    }

    #[instrument(skip(self, content), fields(event_type = content.event_type()))]
    async fn set_room_state(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: Content,
        state_key: &str,
    ) -> Result<Arc<State>, AppError> {
        let rooms = self.rooms.read().await;
        let room = Self::room(&rooms, room_id)?;

        let mut events = self.events.write().await;
        let event_id = self.mint(
            |local| EventId::new(local, user_id.domain()),
            |id| events.contains_key(id),
        )?;

        let mut room_events = room.events.write().await;
        let mut states = room.states.write().await;

        let state_id = StateId::new(content.event_type(), state_key);
        let state = Arc::new(State {
            message: Message::new(event_id.clone(), room_id.clone(), user_id.clone(), content),
            state_key: state_key.to_string(),
            old_state: states.get(&state_id).cloned(),
        });

        events.insert(event_id.clone(), Event::from(state.clone()));
        room_events.push(Event::from(state.clone()));
        states.insert(state_id, state.clone());

        debug!(
            event_id = %event_id,
            replaces = ?state.old_state.as_ref().map(|old| &old.message.event_id),
            "Room state set"
        );
        Ok(state)
    }

    #[instrument(skip(self))]
    async fn room_state(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<Arc<State>>, AppError> {
        let rooms = self.rooms.read().await;
        let room = Self::room(&rooms, room_id)?;

        let states = room.states.read().await;
        Ok(states.get(&StateId::new(event_type, state_key)).cloned())
    }

    #[instrument(skip(self))]
    async fn entire_room_state(&self, room_id: &RoomId) -> Result<Vec<Arc<State>>, AppError> {
        let rooms = self.rooms.read().await;
        let room = Self::room(&rooms, room_id)?;

        let states = room.states.read().await;
        Ok(states.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn room_events(&self, room_id: &RoomId) -> Result<Vec<Event>, AppError> {
        let rooms = self.rooms.read().await;
        let room = Self::room(&rooms, room_id)?;

        let events = room.events.read().await;
        Ok(events.clone())
    }

    async fn get_event(&self, event_id: &EventId) -> Result<Option<Event>, AppError> {
        let events = self.events.read().await;
        Ok(events.get(event_id).cloned())
    }
}
