// Event distribution core
//
// Identifiers and the event data model, the globally indexed event stream,
// and the multiplexer that wakes clients waiting for their next event.

// Public API - what other modules can use
pub use events::{Content, Event, IndexedEvent, Membership, Message, State, StateId};
pub use ids::{EventId, RoomId, UserId};
pub use mux::{ListenOutcome, Listener, Notifier, StreamMux};
pub use stream::{EventFilter, EventStream, IndexedEventStream};

// Internal modules
mod events;
mod ids;
mod mux;
mod stream;
