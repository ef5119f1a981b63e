// Library crate for the room event server
// This file exposes the public API for integration tests

pub mod api;
pub mod config;
pub mod event;
pub mod room;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use event::{
    Content, Event, EventFilter, EventId, EventStream, IndexedEvent, IndexedEventStream,
    ListenOutcome, Listener, Message, Notifier, RoomId, State, StreamMux, UserId,
};
pub use room::{InMemoryMembershipStore, InMemoryRoomStore, MembershipStore, RoomService, RoomStore};
pub use shared::{AppError, AppState};
