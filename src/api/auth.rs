//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login - Sign in, sets the session cookie
//! - POST /api/v1/auth/logout - Sign out
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/password - Change password
//!
//! There is no registration endpoint. Accounts are created with `folio-admin`.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::ClientInfo;
use crate::api::middleware::{
    clear_session_cookie, extract_session_token, session_cookie, ApiError, AppState, AuthenticatedUser,
};
use crate::models::User;
use crate::services::user::LoginInput;

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Routes reachable without a session
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
}

/// Sign in and return both the user and the opaque session token.
///
/// The service applies per-IP and per-username rate limits before checking
/// the password; both surface as 429.
pub async fn login_user(state: &AppState, input: LoginInput, client: &ClientInfo) -> Result<(User, String), ApiError> {
    let session = state.user_service.login(input, client.ip).await?;
    let user = state
        .user_service
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok((user, session.id))
}

fn cookie_headers(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie).map_err(|e| ApiError::internal_error(e.to_string()))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, token) = login_user(&state, body, &client).await?;
    let headers = cookie_headers(&session_cookie(&token, state.user_service.session_expiration_days()))?;

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    Ok((cookie_headers(&clear_session_cookie())?, StatusCode::NO_CONTENT))
}

/// GET /api/v1/auth/me
async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
