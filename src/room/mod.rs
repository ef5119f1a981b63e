// Public API - what other modules can use
pub use membership::{InMemoryMembershipStore, MembershipStore};
pub use repository::{InMemoryRoomStore, RoomStore};
pub use service::{Pushed, RoomService};

// Internal modules
pub mod generators;
pub mod membership;
pub mod repository;
pub mod service;
