//! Tool showcase API endpoints
//!
//! Public:
//! - GET /api/v1/tools[?category=&featured=true&limit=]
//! - GET /api/v1/tools/categories
//! - GET /api/v1/tools/{slug}
//!
//! Admin:
//! - POST /api/v1/admin/tools
//! - GET|PUT|DELETE /api/v1/admin/tools/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateToolInput, Tool, UpdateToolInput};

const DEFAULT_FEATURED_LIMIT: i64 = 6;

#[derive(Debug, Deserialize)]
pub struct ToolQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<Tool>,
    pub total: usize,
}

impl From<Vec<Tool>> for ToolListResponse {
    fn from(tools: Vec<Tool>) -> Self {
        Self {
            total: tools.len(),
            tools,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tools))
        .route("/categories", get(list_categories))
        .route("/{slug}", get(get_tool))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tools).post(create_tool))
        .route("/{id}", get(get_by_id).put(update_tool).delete(delete_tool))
}

/// GET /api/v1/tools
async fn list_tools(State(state): State<AppState>, Query(query): Query<ToolQuery>) -> Result<Json<ToolListResponse>, ApiError> {
    let tools = if query.featured {
        state
            .tool_service
            .featured(query.limit.unwrap_or(DEFAULT_FEATURED_LIMIT))
            .await?
    } else if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        state.tool_service.list_by_category(category).await?
    } else {
        state.tool_service.list().await?
    };
    Ok(Json(tools.into()))
}

/// GET /api/v1/tools/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoryListResponse>, ApiError> {
    Ok(Json(CategoryListResponse {
        categories: state.tool_service.categories().await?,
    }))
}

/// GET /api/v1/tools/{slug}
async fn get_tool(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Tool>, ApiError> {
    state
        .tool_service
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Tool not found: {}", slug)))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Tool>, ApiError> {
    state
        .tool_service
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Tool not found: {}", id)))
}

/// POST /api/v1/admin/tools
async fn create_tool(
    State(state): State<AppState>,
    Json(body): Json<CreateToolInput>,
) -> Result<(StatusCode, Json<Tool>), ApiError> {
    let tool = state.tool_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(tool)))
}

async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateToolInput>,
) -> Result<Json<Tool>, ApiError> {
    Ok(Json(state.tool_service.update(id, body).await?))
}

async fn delete_tool(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.tool_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
