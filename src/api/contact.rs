//! Contact form API endpoints
//!
//! Public:
//! - GET /api/v1/contact/form - field rules and a fresh form token
//! - POST /api/v1/contact - submit a message
//!
//! Admin:
//! - GET /api/v1/admin/messages[?unread_first=true]
//! - GET|DELETE /api/v1/admin/messages/{id}
//! - PUT /api/v1/admin/messages/{id}/read
//! - GET /api/v1/admin/messages/unread-count

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, ClientInfo};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ContactMessage, ListParams, PagedResult};
use crate::services::contact::{SubmitOutcome, HONEYPOT_FIELD, TOKEN_FIELD};
use crate::services::validation::{FieldRule, FormData};

#[derive(Debug, Serialize)]
pub struct FormDescriptor {
    pub rules: Vec<FieldRule>,
    pub token_field: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub honeypot_field: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub unread_first: bool,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default = "default_read")]
    pub is_read: bool,
}

fn default_read() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

pub const THANK_YOU: &str = "Thanks for your message. I'll get back to you soon.";

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(submit))
        .route("/form", get(form_descriptor))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_messages))
        .route("/unread-count", get(unread_count))
        .route("/{id}", get(get_message).delete(delete_message))
        .route("/{id}/read", put(mark_read))
}

/// GET /api/v1/contact/form
async fn form_descriptor(State(state): State<AppState>) -> Json<FormDescriptor> {
    let service = &state.contact_service;
    Json(FormDescriptor {
        rules: service.validator().rules().to_vec(),
        token_field: TOKEN_FIELD,
        token: service.issue_token(),
        honeypot_field: HONEYPOT_FIELD,
    })
}

/// POST /api/v1/contact
///
/// A filled honeypot is answered exactly like a stored message.
async fn submit(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(form): Json<FormData>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    match state.contact_service.submit(&form, &client.fingerprint).await? {
        SubmitOutcome::Stored(_) | SubmitOutcome::Discarded => Ok((
            StatusCode::CREATED,
            Json(SubmitResponse {
                status: "received",
                message: THANK_YOU,
            }),
        )),
    }
}

/// GET /api/v1/admin/messages
async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<PagedResult<ContactMessage>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.contact_service.list(&params, query.unread_first).await?))
}

async fn get_message(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ContactMessage>, ApiError> {
    Ok(Json(state.contact_service.get(id).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MarkReadRequest>,
) -> Result<StatusCode, ApiError> {
    state.contact_service.mark_read(id, body.is_read).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.contact_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unread_count(State(state): State<AppState>) -> Result<Json<UnreadCountResponse>, ApiError> {
    Ok(Json(UnreadCountResponse {
        unread: state.contact_service.unread_count().await?,
    }))
}
