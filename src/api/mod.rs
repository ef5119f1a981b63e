// HTTP surface over the room service, event stream and multiplexer

use axum::{
    routing::{get, post},
    Router,
};

use crate::shared::AppState;

// Public API - what other modules can use
pub use handlers::{
    create_room, get_events, get_keyed_state, get_room_state, get_unkeyed_state, join_room,
    leave_room, send_message, set_keyed_state, set_unkeyed_state, sync,
};

// Internal modules
mod handlers;
pub mod types;

/// Builds the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/:room_id/join", post(join_room))
        .route("/rooms/:room_id/leave", post(leave_room))
        .route("/rooms/:room_id/messages", post(send_message))
        .route("/rooms/:room_id/state", get(get_room_state))
        .route(
            "/rooms/:room_id/state/:event_type",
            get(get_unkeyed_state).put(set_unkeyed_state),
        )
        .route(
            "/rooms/:room_id/state/:event_type/:state_key",
            get(get_keyed_state).put(set_keyed_state),
        )
        .route("/events", get(get_events))
        .route("/sync", get(sync))
        .with_state(state)
}
