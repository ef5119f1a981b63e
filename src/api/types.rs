use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Content, Event, EventId, IndexedEvent, RoomId, UserId};

/// Request payload naming the acting user
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user: UserId,
}

/// Request payload for sending a message or setting state
#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub user: UserId,
    pub content: Content,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

/// Response for a write: the new event's id and stream index
#[derive(Debug, Serialize, Deserialize)]
pub struct PushedResponse {
    pub event_id: EventId,
    pub index: u64,
}

/// Query parameters for GET /events
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub user: UserId,
    pub from: Option<u64>,
    /// Defaults to the stream's next index
    pub to: Option<u64>,
    pub limit: Option<usize>,
}

/// Query parameters for GET /sync
#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub user: UserId,
    pub timeout_ms: Option<u64>,
}

/// JSON view of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    pub event_id: EventId,
    pub room_id: RoomId,
    pub sender: UserId,
    pub timestamp: DateTime<Utc>,
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Event id of the state this one replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<EventId>,
}

impl EventResponse {
    pub fn new(event: &Event, index: Option<u64>) -> Self {
        let message = event.message();
        Self {
            index,
            event_id: message.event_id.clone(),
            room_id: message.room_id.clone(),
            sender: message.sender.clone(),
            timestamp: message.timestamp,
            content: message.content.clone(),
            state_key: event.state_key().map(str::to_string),
            replaces: event
                .as_state()
                .and_then(|state| state.old_state.as_ref())
                .map(|old| old.message.event_id.clone()),
        }
    }
}

impl From<&IndexedEvent> for EventResponse {
    fn from(indexed: &IndexedEvent) -> Self {
        Self::new(&indexed.event, Some(indexed.index))
    }
}

/// Response for GET /events
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<EventResponse>,
    /// Upper end of the window that was queried
    pub end: u64,
}
