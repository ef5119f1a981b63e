use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::event::{EventStream, StreamMux};
use crate::room::membership::MembershipStore;
use crate::room::repository::RoomStore;
use crate::room::service::RoomService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_store: Arc<dyn RoomStore + Send + Sync>,
    pub membership: Arc<dyn MembershipStore + Send + Sync>,
    pub stream: Arc<dyn EventStream + Send + Sync>,
    pub mux: Arc<StreamMux>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        room_store: Arc<dyn RoomStore + Send + Sync>,
        membership: Arc<dyn MembershipStore + Send + Sync>,
        stream: Arc<dyn EventStream + Send + Sync>,
        mux: Arc<StreamMux>,
        config: ServerConfig,
    ) -> Self {
        Self {
            room_store,
            membership,
            stream,
            mux,
            config,
        }
    }

    /// Builds a room service over this state's store, membership and stream
    pub fn room_service(&self) -> RoomService {
        RoomService::new(
            Arc::clone(&self.room_store),
            Arc::clone(&self.membership),
            Arc::clone(&self.stream),
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn room_not_found(room_id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("room '{}' doesn't exist", room_id))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::event::IndexedEventStream;
    use crate::room::generators::RandomIdGenerator;
    use crate::room::membership::InMemoryMembershipStore;
    use crate::room::repository::InMemoryRoomStore;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        room_store: Option<Arc<dyn RoomStore + Send + Sync>>,
        membership: Option<Arc<InMemoryMembershipStore>>,
        config: ServerConfig,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                room_store: None,
                membership: None,
                config: ServerConfig::default(),
            }
        }

        pub fn with_room_store(mut self, store: Arc<dyn RoomStore + Send + Sync>) -> Self {
            self.room_store = Some(store);
            self
        }

        pub fn with_membership(mut self, membership: Arc<InMemoryMembershipStore>) -> Self {
            self.membership = Some(membership);
            self
        }

        pub fn with_config(mut self, config: ServerConfig) -> Self {
            self.config = config;
            self
        }

        pub fn build(self) -> AppState {
            let membership = self
                .membership
                .unwrap_or_else(|| Arc::new(InMemoryMembershipStore::new()));
            let mux = Arc::new(StreamMux::new());
            let stream = Arc::new(IndexedEventStream::new(membership.clone(), mux.clone()));
            let room_store = self.room_store.unwrap_or_else(|| {
                Arc::new(InMemoryRoomStore::new(Arc::new(RandomIdGenerator::new(
                    self.config.id_length,
                ))))
            });

            AppState {
                room_store,
                membership,
                stream,
                mux,
                config: self.config,
            }
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
