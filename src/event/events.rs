use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ids::{EventId, RoomId, UserId};

/// Membership values carried by `m.room.member` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Leave,
}

/// Typed payload of an event
///
/// The variant decides the event type; `Custom` carries its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum Content {
    #[serde(rename = "m.room.create")]
    Create { creator: UserId },

    #[serde(rename = "m.room.message")]
    Message { msgtype: String, body: String },

    #[serde(rename = "m.room.name")]
    Name { name: String },

    #[serde(rename = "m.room.topic")]
    Topic { topic: String },

    #[serde(rename = "m.room.member")]
    Member { membership: Membership },

    #[serde(rename = "custom")]
    Custom {
        event_type: String,
        body: serde_json::Value,
    },
}

impl Content {
    /// Plain text message content
    pub fn text(body: impl Into<String>) -> Self {
        Content::Message {
            msgtype: "m.text".to_string(),
            body: body.into(),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Content::Create { .. } => "m.room.create",
            Content::Message { .. } => "m.room.message",
            Content::Name { .. } => "m.room.name",
            Content::Topic { .. } => "m.room.topic",
            Content::Member { .. } => "m.room.member",
            Content::Custom { event_type, .. } => event_type.as_str(),
        }
    }
}

/// An immutable point-in-time event
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub event_id: EventId,
    pub room_id: RoomId,
    pub sender: UserId,
    pub timestamp: DateTime<Utc>,
    pub content: Content,
}

impl Message {
    /// Creates a message stamped with the current time
    pub fn new(event_id: EventId, room_id: RoomId, sender: UserId, content: Content) -> Self {
        Self {
            event_id,
            room_id,
            sender,
            timestamp: Utc::now(),
            content,
        }
    }

    pub fn event_type(&self) -> &str {
        self.content.event_type()
    }
}

/// A message occupying a state slot, linked to the state it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub message: Message,
    pub state_key: String,
    pub old_state: Option<Arc<State>>,
}

impl State {
    pub fn state_id(&self) -> StateId {
        StateId::new(self.message.event_type(), self.state_key.clone())
    }

    /// Walks the version chain from this state back to the first one
    pub fn history(self: &Arc<Self>) -> impl Iterator<Item = Arc<State>> {
        std::iter::successors(Some(Arc::clone(self)), |state| state.old_state.clone())
    }
}

/// Identifies a state slot within a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateId {
    pub event_type: String,
    pub state_key: String,
}

impl StateId {
    pub fn new(event_type: impl Into<String>, state_key: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            state_key: state_key.into(),
        }
    }
}

/// Anything that can be recorded in a room or pushed into the stream
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(Arc<Message>),
    State(Arc<State>),
}

impl Event {
    /// The message part shared by both variants
    pub fn message(&self) -> &Message {
        match self {
            Event::Message(message) => message,
            Event::State(state) => &state.message,
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.message().event_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.message().room_id
    }

    pub fn sender(&self) -> &UserId {
        &self.message().sender
    }

    pub fn content(&self) -> &Content {
        &self.message().content
    }

    pub fn event_type(&self) -> &str {
        self.message().event_type()
    }

    pub fn state_key(&self) -> Option<&str> {
        match self {
            Event::Message(_) => None,
            Event::State(state) => Some(&state.state_key),
        }
    }

    pub fn as_state(&self) -> Option<&Arc<State>> {
        match self {
            Event::Message(_) => None,
            Event::State(state) => Some(state),
        }
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::Message(Arc::new(message))
    }
}

impl From<Arc<Message>> for Event {
    fn from(message: Arc<Message>) -> Self {
        Event::Message(message)
    }
}

impl From<Arc<State>> for Event {
    fn from(state: Arc<State>) -> Self {
        Event::State(state)
    }
}

/// An event together with the global index the stream assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEvent {
    pub index: u64,
    pub event: Event,
}

impl IndexedEvent {
    pub fn new(index: u64, event: Event) -> Self {
        Self { index, event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }
}
