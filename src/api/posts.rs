//! Post API endpoints
//!
//! Public (published posts only):
//! - GET /api/v1/posts
//! - GET /api/v1/posts/{slug}
//!
//! Admin:
//! - GET /api/v1/admin/posts
//! - POST /api/v1/admin/posts
//! - GET|PUT|DELETE /api/v1/admin/posts/{id}
//! - POST /api/v1/admin/posts/{id}/publish
//! - POST /api/v1/admin/posts/{id}/unpublish
//! - POST /api/v1/admin/posts/preview

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{AdminPaginationQuery, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreatePostInput, PagedResult, Post, UpdatePostInput};

#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    pub reading_time_minutes: usize,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            reading_time_minutes: post.reading_time_minutes(),
            post,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl From<PagedResult<Post>> for PostListResponse {
    fn from(result: PagedResult<Post>) -> Self {
        let total_pages = result.total_pages();
        Self {
            total: result.total,
            page: result.page,
            page_size: result.per_page,
            total_pages,
            posts: result.items.into_iter().map(PostResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub html: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_post))
        .route("/preview", post(preview))
        .route("/{id}", get(get_by_id).put(update_post).delete(delete_post))
        .route("/{id}/publish", post(publish))
        .route("/{id}/unpublish", post(unpublish))
}

/// GET /api/v1/posts
async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let result = state.post_service.list_published(&query.params()).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/posts/{slug}
///
/// Drafts and archived posts answer 404 so their existence is not leaked.
async fn get_published(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .post_service
        .get_published_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Post not found: {}", slug)))?;
    Ok(Json(post.into()))
}

/// GET /api/v1/admin/posts
async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let result = state.post_service.list(&query.params()).await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/admin/posts
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let post = state.post_service.create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .post_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Post not found: {}", id)))?;
    Ok(Json(post.into()))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state.post_service.update(id, body).await?;
    Ok(Json(post.into()))
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<PostResponse>, ApiError> {
    Ok(Json(state.post_service.publish(id).await?.into()))
}

async fn unpublish(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<PostResponse>, ApiError> {
    Ok(Json(state.post_service.unpublish(id).await?.into()))
}

/// POST /api/v1/admin/posts/preview
async fn preview(State(state): State<AppState>, Json(body): Json<PreviewRequest>) -> Json<PreviewResponse> {
    Json(PreviewResponse {
        html: state.post_service.preview(&body.body),
    })
}
