//! API layer - HTTP handlers and routing
//!
//! - JSON API under `/api/v1` (public, session-protected and admin routes)
//! - Server-rendered pages, behind the rendered-page cache
//! - Health probes and embedded static assets

pub mod admin;
pub mod auth;
pub mod chat;
pub mod common;
pub mod contact;
pub mod health;
pub mod middleware;
pub mod pages;
pub mod posts;
pub mod site;
pub mod static_files;
pub mod tools;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .nest("/admin/posts", posts::admin_router())
        .nest("/admin/tools", tools::admin_router())
        .nest("/admin/messages", contact::admin_router())
        .nest("/admin/chat", chat::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(state, middleware::require_auth));

    Router::new()
        .nest("/posts", posts::public_router())
        .nest("/tools", tools::public_router())
        .nest("/contact", contact::public_router())
        .nest("/chat", chat::public_router())
        .nest("/site", site::router())
        .nest("/auth", auth::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(origin = cors_origin, "invalid CORS origin, cross-origin requests disabled: {e}");
            cors
        }
    }
}

/// Build the complete application router with middleware
pub fn build_router(state: AppState) -> Router {
    let pages = pages::router().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::page_cache_middleware,
    ));

    Router::new()
        .merge(health::router())
        .merge(pages)
        .merge(pages::admin_router())
        .merge(static_files::router())
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(pages::fallback)
        .layer(cors_layer(&state.config.server.cors_origin))
        .layer(CompressionLayer::new())
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::security_headers))
        // Outermost, so timings include every other layer
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
