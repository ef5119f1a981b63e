use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use super::types::{
    ContentRequest, CreateRoomResponse, EventResponse, EventsQuery, EventsResponse,
    PushedResponse, SyncQuery, UserRequest,
};
use crate::event::{Event, ListenOutcome, RoomId};
use crate::shared::{AppError, AppState};

/// Upper bound on events returned by one GET /events
const MAX_EVENTS_LIMIT: usize = 1000;
const DEFAULT_EVENTS_LIMIT: usize = 100;

fn parse_room_id(raw: &str) -> Result<RoomId, AppError> {
    raw.parse()
}

/// POST /rooms
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    let room_id = state
        .room_service()
        .create_room(&state.config.domain, &request.user)
        .await?;

    info!(room_id = %room_id, creator = %request.user, "Room created via API");
    Ok(Json(CreateRoomResponse { room_id }))
}

/// POST /rooms/:room_id/join
#[instrument(name = "join_room", skip(state))]
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<UserRequest>,
) -> Result<Json<PushedResponse>, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let pushed = state
        .room_service()
        .join_room(&room_id, &request.user)
        .await?;

    Ok(Json(PushedResponse {
        event_id: pushed.event.message.event_id.clone(),
        index: pushed.index,
    }))
}

/// POST /rooms/:room_id/leave
#[instrument(name = "leave_room", skip(state))]
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<UserRequest>,
) -> Result<Json<PushedResponse>, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let pushed = state
        .room_service()
        .leave_room(&room_id, &request.user)
        .await?;

    Ok(Json(PushedResponse {
        event_id: pushed.event.message.event_id.clone(),
        index: pushed.index,
    }))
}

/// POST /rooms/:room_id/messages
#[instrument(name = "send_message", skip(state, request))]
pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<ContentRequest>,
) -> Result<Json<PushedResponse>, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let pushed = state
        .room_service()
        .send_message(&room_id, &request.user, request.content)
        .await?;

    Ok(Json(PushedResponse {
        event_id: pushed.event.event_id.clone(),
        index: pushed.index,
    }))
}

/// PUT /rooms/:room_id/state/:event_type/:state_key
pub async fn set_keyed_state(
    State(state): State<AppState>,
    Path((room_id, event_type, state_key)): Path<(String, String, String)>,
    Json(request): Json<ContentRequest>,
) -> Result<Json<PushedResponse>, AppError> {
    set_state(state, &room_id, &event_type, &state_key, request).await
}

/// PUT /rooms/:room_id/state/:event_type
pub async fn set_unkeyed_state(
    State(state): State<AppState>,
    Path((room_id, event_type)): Path<(String, String)>,
    Json(request): Json<ContentRequest>,
) -> Result<Json<PushedResponse>, AppError> {
    set_state(state, &room_id, &event_type, "", request).await
}

#[instrument(name = "set_state", skip(state, request))]
async fn set_state(
    state: AppState,
    room_id: &str,
    event_type: &str,
    state_key: &str,
    request: ContentRequest,
) -> Result<Json<PushedResponse>, AppError> {
    let room_id = parse_room_id(room_id)?;
    if request.content.event_type() != event_type {
        return Err(AppError::BadRequest(format!(
            "content of type '{}' cannot be stored under '{}'",
            request.content.event_type(),
            event_type
        )));
    }

    let pushed = state
        .room_service()
        .set_state(&room_id, &request.user, request.content, state_key)
        .await?;

    Ok(Json(PushedResponse {
        event_id: pushed.event.message.event_id.clone(),
        index: pushed.index,
    }))
}

/// GET /rooms/:room_id/state/:event_type/:state_key
pub async fn get_keyed_state(
    State(state): State<AppState>,
    Path((room_id, event_type, state_key)): Path<(String, String, String)>,
) -> Result<Json<EventResponse>, AppError> {
    get_state(state, &room_id, &event_type, &state_key).await
}

/// GET /rooms/:room_id/state/:event_type
pub async fn get_unkeyed_state(
    State(state): State<AppState>,
    Path((room_id, event_type)): Path<(String, String)>,
) -> Result<Json<EventResponse>, AppError> {
    get_state(state, &room_id, &event_type, "").await
}

#[instrument(name = "get_state", skip(state))]
async fn get_state(
    state: AppState,
    room_id: &str,
    event_type: &str,
    state_key: &str,
) -> Result<Json<EventResponse>, AppError> {
    let room_id = parse_room_id(room_id)?;
    let current = state
        .room_store
        .room_state(&room_id, event_type, state_key)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no '{}' state with key '{}' in room '{}'",
                event_type, state_key, room_id
            ))
        })?;

    Ok(Json(EventResponse::new(&Event::from(current), None)))
}

/// GET /rooms/:room_id/state
#[instrument(name = "get_room_state", skip(state))]
pub async fn get_room_state(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let states = state.room_store.entire_room_state(&room_id).await?;

    Ok(Json(
        states
            .into_iter()
            .map(|current| EventResponse::new(&Event::from(current), None))
            .collect(),
    ))
}

/// GET /events?user=..&from=..&to=..&limit=..
///
/// History across every room the user belongs to
#[instrument(name = "get_events", skip(state))]
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, AppError> {
    let rooms: HashSet<RoomId> = state.room_service().rooms_of(&query.user).await?;
    let from = query.from.unwrap_or(0);
    let to = match query.to {
        Some(to) => to,
        None => state.stream.next_index().await,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENTS_LIMIT)
        .min(MAX_EVENTS_LIMIT);

    let events = state
        .stream
        .range(&query.user, None, &rooms, from, to, limit)
        .await?;

    debug!(returned = events.len(), "Events listed");
    Ok(Json(EventsResponse {
        events: events.iter().map(EventResponse::from).collect(),
        end: to,
    }))
}

/// GET /sync?user=..&timeout_ms=..
///
/// Waits for the next event addressed to the user. Responds 204 when the
/// timeout elapses first.
#[instrument(name = "sync", skip(state))]
pub async fn sync(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> Result<Response, AppError> {
    let timeout = state.config.sync_timeout(query.timeout_ms);
    let listener = state
        .mux
        .listen(query.user.clone(), tokio::time::sleep(timeout))
        .await;

    match listener.recv().await {
        ListenOutcome::Delivered(event) => {
            debug!(index = event.index, "Sync woke with event");
            Ok(Json(EventResponse::from(&event)).into_response())
        }
        ListenOutcome::Cancelled => {
            debug!(timeout_ms = timeout.as_millis() as u64, "Sync timed out");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}
