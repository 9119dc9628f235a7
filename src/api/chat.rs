//! Chat API endpoints
//!
//! Public:
//! - GET /api/v1/chat/rooms/{room}/messages[?limit=]
//! - POST /api/v1/chat/rooms/{room}/messages
//! - GET /api/v1/chat/rooms/{room}/events - Server-Sent Events stream
//!
//! Admin:
//! - DELETE /api/v1/admin/chat/messages/{id}
//! - POST /api/v1/admin/chat/prune

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::api::common::ClientInfo;
use crate::api::middleware::{ApiError, AppState};
use crate::models::ChatMessage;
use crate::services::chat::ChatEvent;
use crate::services::validation::FormData;

const KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub room: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub deleted: u64,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room}/messages", get(history).post(post_message))
        .route("/rooms/{room}/events", get(events))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/messages/{id}", delete(delete_message))
        .route("/prune", post(prune))
}

/// GET /api/v1/chat/rooms/{room}/messages
async fn history(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state.chat_service.recent(&room, query.limit).await?;
    Ok(Json(HistoryResponse { room, messages }))
}

/// POST /api/v1/chat/rooms/{room}/messages
async fn post_message(
    State(state): State<AppState>,
    Path(room): Path<String>,
    client: ClientInfo,
    Json(form): Json<FormData>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = state.chat_service.post(&room, &form, &client.fingerprint).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/chat/rooms/{room}/events
async fn events(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let receiver = state.chat_service.subscribe(&room).await?;
    tracing::debug!(room = %room, "chat subscriber connected");

    Ok(Sse::new(event_stream(receiver)).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS))))
}

/// Turn a broadcast receiver into SSE events. Lagging subscribers skip the
/// missed events; the stream ends when the channel closes.
fn event_stream(receiver: broadcast::Receiver<ChatEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((Ok(to_sse(&event)), receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "chat subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

fn to_sse(event: &ChatEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.name()).data(data)
}

async fn delete_message(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.chat_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/chat/prune
async fn prune(State(state): State<AppState>) -> Result<Json<PruneResponse>, ApiError> {
    Ok(Json(PruneResponse {
        deleted: state.chat_service.prune().await?,
    }))
}
