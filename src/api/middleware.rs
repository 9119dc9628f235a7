//! API middleware
//!
//! Contains:
//! - Shared application state
//! - Error responses and service error mapping
//! - Authentication (session token) and admin authorization
//! - Request timing with `Server-Timing` and slow-request logging
//! - Security headers
//! - Rendered-page cache
//! - HTTP cache helpers (ETag, Cache-Control)

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::cache::{Cache, CacheLayer};
use crate::config::Config;
use crate::db::DynDatabasePool;
use crate::effects::Capabilities;
use crate::models::User;
use crate::services::{
    chat::ChatService,
    contact::ContactService,
    page_cache,
    post::PostService,
    settings::SettingsService,
    tool::ToolService,
    user::UserService,
    ChatError, ContactError, PostServiceError, SettingsServiceError, ToolServiceError, UserServiceError,
};
use crate::theme::ThemeEngine;

pub const SESSION_COOKIE: &str = "session";

// ============================================================================
// Request Statistics
// ============================================================================

/// Request counters updated with atomics only
pub struct RequestStats {
    total_requests: AtomicU64,
    total_response_time_us: AtomicU64,
    slow_requests: AtomicU64,
    server_errors: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            slow_requests: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64, slow: bool, server_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if slow {
            self.slow_requests.fetch_add(1, Ordering::Relaxed);
        }
        if server_error {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn slow_requests(&self) -> u64 {
        self.slow_requests.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> u64 {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DynDatabasePool,
    pub cache: Arc<Cache>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub tool_service: Arc<ToolService>,
    pub contact_service: Arc<ContactService>,
    pub chat_service: Arc<ChatService>,
    pub settings_service: Arc<SettingsService>,
    pub theme_engine: Arc<RwLock<ThemeEngine>>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Read access to the theme engine; a poisoned lock is recovered
    pub fn theme(&self) -> RwLockReadGuard<'_, ThemeEngine> {
        self.theme_engine.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn theme_mut(&self) -> RwLockWriteGuard<'_, ThemeEngine> {
        self.theme_engine.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal errors are logged here and reported without their cause
    fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "Request failed");
        Self::internal_error("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(_) => Self::not_found(err.to_string()),
            PostServiceError::ValidationError(msg) => Self::validation_error(msg),
            PostServiceError::UnknownAuthor(_) => Self::validation_error(err.to_string()),
            PostServiceError::DuplicateSlug(_) => Self::conflict(err.to_string()),
            PostServiceError::InternalError(e) => Self::internal(format!("{e:#}")),
        }
    }
}

impl From<ToolServiceError> for ApiError {
    fn from(err: ToolServiceError) -> Self {
        match err {
            ToolServiceError::NotFound(_) => Self::not_found(err.to_string()),
            ToolServiceError::ValidationError(msg) => Self::validation_error(msg),
            ToolServiceError::DuplicateSlug(_) => Self::conflict(err.to_string()),
            ToolServiceError::InternalError(e) => Self::internal(format!("{e:#}")),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(err: ContactError) -> Self {
        match err {
            ContactError::Validation(state) => {
                Self::with_details("VALIDATION_ERROR", "Please correct the highlighted fields", state.errors_json())
            }
            ContactError::InvalidToken(e) => Self::validation_error(e.to_string()),
            ContactError::RateLimited => Self::rate_limited(err.to_string()),
            ContactError::NotFound(_) => Self::not_found(err.to_string()),
            ContactError::Internal(e) => Self::internal(format!("{e:#}")),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Disabled => Self::not_found(err.to_string()),
            ChatError::InvalidRoom(_) => Self::validation_error(err.to_string()),
            ChatError::Validation(state) => {
                Self::with_details("VALIDATION_ERROR", "Please correct the highlighted fields", state.errors_json())
            }
            ChatError::RateLimited => Self::rate_limited(err.to_string()),
            ChatError::NotFound(_) => Self::not_found(err.to_string()),
            ChatError::Internal(e) => Self::internal(format!("{e:#}")),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(_) => Self::conflict(err.to_string()),
            UserServiceError::RateLimited => Self::rate_limited(err.to_string()),
            UserServiceError::InternalError(e) => Self::internal(format!("{e:#}")),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(err: SettingsServiceError) -> Self {
        match err {
            SettingsServiceError::InvalidValue(msg) => Self::validation_error(msg),
            SettingsServiceError::Storage(e) => Self::internal(format!("{e:#}")),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Session token from `Authorization: Bearer` or the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix("session="))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value for a new session
pub fn session_cookie(token: &str, max_age_days: i64) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age_days * 24 * 60 * 60
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Attach the user when a valid session is present; never rejects
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        if let Ok(Some(user)) = state.user_service.validate_session(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Must run after [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Request timing
// ============================================================================

/// Records every request in [`RequestStats`], adds `Server-Timing` and logs
/// requests slower than `monitoring.slow_request_ms`.
pub async fn request_stats_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;

    let elapsed = start.elapsed();
    let threshold = state.config.monitoring.slow_request_ms;
    let slow = threshold > 0 && elapsed >= Duration::from_millis(threshold);
    let status = response.status();

    state
        .request_stats
        .record(elapsed.as_micros() as u64, slow, status.is_server_error());

    if slow {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            threshold_ms = threshold,
            "Slow request"
        );
    }

    if state.config.monitoring.server_timing {
        let value = server_timing_value(elapsed);
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().append(HeaderName::from_static("server-timing"), value);
        }
    }

    response
}

pub fn server_timing_value(elapsed: Duration) -> String {
    format!("app;dur={:.1}", elapsed.as_secs_f64() * 1000.0)
}

// ============================================================================
// Security headers
// ============================================================================

pub async fn security_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), &state.config.security);
    response
}

pub fn apply_security_headers(headers: &mut HeaderMap, security: &crate::config::SecurityConfig) {
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    // Ask for the hints that pick the effects mode of the first render
    headers.insert(
        HeaderName::from_static("accept-ch"),
        HeaderValue::from_static("Sec-CH-Prefers-Reduced-Motion, Sec-CH-UA-Mobile"),
    );
    if !security.csp.is_empty() && !headers.contains_key(header::CONTENT_SECURITY_POLICY) {
        match HeaderValue::from_str(&security.csp) {
            Ok(value) => {
                headers.insert(header::CONTENT_SECURITY_POLICY, value);
            }
            Err(_) => tracing::warn!("Configured Content-Security-Policy is not a valid header value"),
        }
    }
    if security.hsts {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
}

// ============================================================================
// Rendered-page cache
// ============================================================================

/// Upper bound on a cached page body
const MAX_CACHED_PAGE_BYTES: usize = 2 * 1024 * 1024;

const PAGE_CACHE_HEADER: &str = "x-page-cache";

/// Pages that carry per-visitor content are never cached
const UNCACHEABLE_PREFIXES: [&str; 3] = ["/contact", "/chat", "/admin"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
    pub body: String,
    pub etag: String,
}

pub fn is_cacheable_page(method: &Method, path: &str, headers: &HeaderMap) -> bool {
    method == Method::GET
        && !UNCACHEABLE_PREFIXES.iter().any(|p| path.starts_with(p))
        && extract_session_token(headers).is_none()
}

/// Serve anonymous GET pages from the cache, keyed by path and effects mode
pub async fn page_cache_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_cacheable_page(request.method(), request.uri().path(), request.headers()) {
        return next.run(request).await;
    }

    let mode = Capabilities::from_client_hints(request.headers()).effects_mode();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = page_cache::page_key(mode, &path_and_query);
    let if_none_match = request
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match state.cache.get::<CachedPage>(&key).await {
        Ok(Some(page)) => {
            if etag_matches(if_none_match.as_deref(), &page.etag) {
                return not_modified(&page.etag);
            }
            return html_page_response(page, "HIT");
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(key = %key, "Page cache read failed: {e:#}"),
    }

    let response = next.run(request).await;
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    if !fits_page_cache(response.body()) {
        tracing::debug!(key = %key, "page too large or unsized, serving uncached");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_PAGE_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, "Failed to buffer page for caching: {e}");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let Ok(body) = String::from_utf8(bytes.to_vec()) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    let page = CachedPage {
        etag: generate_etag(body.as_bytes()),
        body,
    };
    let ttl = Duration::from_secs(state.config.cache.ttl_seconds);
    if let Err(e) = state.cache.set(&key, &page, ttl).await {
        tracing::warn!(key = %key, "Page cache write failed: {e:#}");
    }

    let mut response = Response::from_parts(parts, Body::from(page.body));
    if let Ok(value) = HeaderValue::from_str(&page.etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
        .headers_mut()
        .insert(HeaderName::from_static(PAGE_CACHE_HEADER), HeaderValue::from_static("MISS"));
    response
}

/// Only bodies with a known size under the limit are buffered, so an
/// oversized page is never consumed and then dropped.
fn fits_page_cache(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_CACHED_PAGE_BYTES as u64)
}

fn html_page_response(page: CachedPage, status: &'static str) -> Response {
    let mut response = (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        page.body,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&page.etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
        .headers_mut()
        .insert(HeaderName::from_static(PAGE_CACHE_HEADER), HeaderValue::from_static(status));
    response
}

// ============================================================================
// HTTP Cache Headers
// ============================================================================

/// Strong ETag (SHA-256) of a body
pub fn generate_etag(content: &[u8]) -> String {
    crate::theme::assets::etag_for(content)
}

/// Weak comparison: `W/` prefixes are ignored, `*` matches anything and
/// comma-separated lists are supported.
pub fn etag_matches(request_etag: Option<&str>, response_etag: &str) -> bool {
    let Some(header) = request_etag else {
        return false;
    };
    let response_etag = response_etag.trim_start_matches("W/");
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.trim_start_matches("W/") == response_etag
    })
}

pub fn cache_control_static(max_age: u32, immutable: bool) -> String {
    if immutable {
        format!("public, max-age={}, immutable", max_age)
    } else {
        format!("public, max-age={}", max_age)
    }
}

pub fn cache_control_api(max_age: u32, stale_while_revalidate: Option<u32>) -> String {
    match stale_while_revalidate {
        Some(swr) => format!("public, max-age={}, stale-while-revalidate={}", max_age, swr),
        None => format!("public, max-age={}", max_age),
    }
}

pub fn cache_control_no_cache() -> &'static str {
    "no-cache, no-store, must-revalidate"
}

pub fn not_modified(etag: &str) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    if let Ok(value) = HeaderValue::from_str(etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

/// `304 Not Modified` when the request's `If-None-Match` matches `etag`
pub fn check_if_none_match(headers: &HeaderMap, etag: &str) -> Option<Response> {
    let if_none_match = headers.get(header::IF_NONE_MATCH)?.to_str().ok()?;
    etag_matches(Some(if_none_match), etag).then(|| not_modified(etag))
}

/// Get the authenticated user from request extensions
pub fn get_authenticated_user(request: &Request) -> Option<&User> {
    request.extensions().get::<AuthenticatedUser>().map(|au| &au.0)
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod cache_header_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_etag_is_strong_sha256() {
        let etag = generate_etag(b"Hello, World!");
        assert_eq!(etag.len(), 64 + 2);
        assert_eq!(etag, generate_etag(b"Hello, World!"));
        assert_ne!(etag, generate_etag(b"Hello"));
    }

    #[test]
    fn test_etag_matches() {
        assert!(etag_matches(Some("\"12345\""), "\"12345\""));
        assert!(!etag_matches(Some("\"54321\""), "\"12345\""));
        assert!(etag_matches(Some("W/\"12345\""), "\"12345\""));
        assert!(etag_matches(Some("\"a\", \"12345\""), "\"12345\""));
        assert!(etag_matches(Some("*"), "\"12345\""));
        assert!(!etag_matches(None, "\"12345\""));
    }

    #[test]
    fn test_check_if_none_match() {
        let mut h = HeaderMap::new();
        assert!(check_if_none_match(&h, "\"x\"").is_none());
        h.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"x\""));
        let response = check_if_none_match(&h, "\"x\"").unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[header::ETAG], "\"x\"");
    }

    #[test]
    fn test_cache_control_builders() {
        assert_eq!(cache_control_static(31536000, true), "public, max-age=31536000, immutable");
        assert_eq!(cache_control_static(3600, false), "public, max-age=3600");
        assert!(cache_control_api(300, Some(3600)).contains("stale-while-revalidate=3600"));
        assert!(cache_control_no_cache().contains("no-store"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_etag_deterministic(content in prop::collection::vec(any::<u8>(), 0..100)) {
            prop_assert_eq!(generate_etag(&content), generate_etag(&content));
        }

        #[test]
        fn prop_etag_self_match(hash in "[0-9a-f]{8,16}") {
            let etag = format!("\"{}\"", hash);
            prop_assert!(etag_matches(Some(&etag), &etag));
            let weak = format!("W/{}", etag);
            prop_assert!(etag_matches(Some(&weak), &etag));
        }

        #[test]
        fn prop_static_cache_public(max_age in 1u32..=31536000u32, immutable in any::<bool>()) {
            let header = cache_control_static(max_age, immutable);
            let expected = format!("max-age={}", max_age);
            prop_assert!(header.starts_with("public"));
            prop_assert!(header.contains(&expected));
            prop_assert_eq!(header.contains("immutable"), immutable);
        }
    }
}
