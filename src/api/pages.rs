//! Server-rendered HTML pages
//!
//! Public pages sit behind the rendered-page cache; the admin skin and every
//! form POST bypass it.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::auth::login_user;
use crate::api::common::{ClientInfo, PaginationQuery};
use crate::api::middleware::{extract_session_token, session_cookie, AppState};
use crate::api::posts::PostResponse;
use crate::models::{ListParams, User};
use crate::services::chat::{is_valid_room, DEFAULT_ROOM};
use crate::services::contact::{SubmitOutcome, HONEYPOT_FIELD, TOKEN_FIELD};
use crate::services::user::LoginInput;
use crate::services::validation::{FormData, FormValidator};
use crate::services::{ContactError, SiteSettings};
use crate::theme::{CurrentUser, StandardTemplateVars};

const RECENT_POSTS: u32 = 5;
const FEATURED_TOOLS: i64 = 6;

/// Public pages (cacheable)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/blog/", get(blog_list))
        .route("/blog/{slug}/", get(post_detail))
        .route("/tools/", get(tool_list))
        .route("/tools/{slug}/", get(tool_detail))
        .route("/contact/", get(contact_form).post(contact_submit))
        .route("/chat/", get(chat_page))
        .route("/offline/", get(offline))
}

/// Dashboard skin and its login form
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/", get(admin_dashboard))
        .route("/admin/login/", get(admin_login_form).post(admin_login))
}

// ============================================================================
// Rendering helpers
// ============================================================================

async fn site_settings(state: &AppState) -> SiteSettings {
    state.settings_service.get_site_settings().await.unwrap_or_else(|e| {
        tracing::warn!("failed to load site settings: {e}");
        SiteSettings::default()
    })
}

async fn page_vars(state: &AppState, client: &ClientInfo, path: &str) -> StandardTemplateVars {
    StandardTemplateVars::new(site_settings(state).await, path)
        .with_effects_mode(client.effects_mode)
        .with_chat(state.chat_service.is_enabled())
}

fn render_page(state: &AppState, status: StatusCode, template: &str, context: TeraContext, vars: &StandardTemplateVars) -> Response {
    let engine = state.theme();
    match engine.render_with_standard_vars(template, &context, vars) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(template, "page render failed: {e:#}");
            let html = engine.render_error(500, "Something went wrong while rendering this page.", vars);
            (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response()
        }
    }
}

fn error_page(state: &AppState, status: StatusCode, message: &str, vars: &StandardTemplateVars) -> Response {
    let html = state.theme().render_error(status.as_u16(), message, vars);
    (status, Html(html)).into_response()
}

fn not_found(state: &AppState, vars: &StandardTemplateVars) -> Response {
    error_page(state, StatusCode::NOT_FOUND, "The page you were looking for does not exist.", vars)
}

fn server_error(state: &AppState, vars: &StandardTemplateVars, e: impl std::fmt::Display) -> Response {
    tracing::error!("page handler failed: {e}");
    error_page(state, StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong on our side.", vars)
}

/// Fallback for unmatched routes
pub async fn fallback(State(state): State<AppState>, client: ClientInfo, uri: axum::http::Uri) -> Response {
    let vars = page_vars(&state, &client, uri.path()).await;
    not_found(&state, &vars)
}

// ============================================================================
// Public pages
// ============================================================================

async fn index(State(state): State<AppState>, client: ClientInfo) -> Response {
    let vars = page_vars(&state, &client, "/").await;

    let posts = match state.post_service.recent(RECENT_POSTS).await {
        Ok(posts) => posts.into_iter().map(PostResponse::from).collect::<Vec<_>>(),
        Err(e) => return server_error(&state, &vars, e),
    };
    let tools = match state.tool_service.featured(FEATURED_TOOLS).await {
        Ok(tools) => tools,
        Err(e) => return server_error(&state, &vars, e),
    };

    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    context.insert("tools", &tools);
    render_page(&state, StatusCode::OK, "index.html", context, &vars)
}

async fn blog_list(State(state): State<AppState>, client: ClientInfo, Query(query): Query<PaginationQuery>) -> Response {
    let vars = page_vars(&state, &client, "/blog/").await;
    let per_page = u32::try_from(vars.site.posts_per_page).unwrap_or(10);
    let params = ListParams::new(query.page, per_page);

    let result = match state.post_service.list_published(&params).await {
        Ok(result) => result,
        Err(e) => return server_error(&state, &vars, e),
    };
    let total_pages = result.total_pages();

    let mut context = TeraContext::new();
    context.insert("page", &result.page);
    context.insert("total_pages", &total_pages);
    context.insert("total", &result.total);
    context.insert("posts", &result.map(PostResponse::from).items);
    render_page(&state, StatusCode::OK, "blog_list.html", context, &vars)
}

async fn post_detail(State(state): State<AppState>, client: ClientInfo, Path(slug): Path<String>) -> Response {
    let vars = page_vars(&state, &client, &format!("/blog/{slug}/")).await;

    match state.post_service.get_published_by_slug(&slug).await {
        Ok(Some(post)) => {
            let mut context = TeraContext::new();
            context.insert("post", &PostResponse::from(post));
            render_page(&state, StatusCode::OK, "post.html", context, &vars)
        }
        Ok(None) => not_found(&state, &vars),
        Err(e) => server_error(&state, &vars, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolFilter {
    pub category: Option<String>,
}

async fn tool_list(State(state): State<AppState>, client: ClientInfo, Query(filter): Query<ToolFilter>) -> Response {
    let vars = page_vars(&state, &client, "/tools/").await;
    let category = filter.category.filter(|c| !c.trim().is_empty());

    let tools = match &category {
        Some(category) => state.tool_service.list_by_category(category).await,
        None => state.tool_service.list().await,
    };
    let (tools, categories) = match (tools, state.tool_service.categories().await) {
        (Ok(tools), Ok(categories)) => (tools, categories),
        (Err(e), _) => return server_error(&state, &vars, e),
        (_, Err(e)) => return server_error(&state, &vars, e),
    };

    let mut context = TeraContext::new();
    context.insert("tools", &tools);
    context.insert("categories", &categories);
    context.insert("active_category", &category);
    render_page(&state, StatusCode::OK, "tools.html", context, &vars)
}

async fn tool_detail(State(state): State<AppState>, client: ClientInfo, Path(slug): Path<String>) -> Response {
    let vars = page_vars(&state, &client, &format!("/tools/{slug}/")).await;

    match state.tool_service.get_by_slug(&slug).await {
        Ok(Some(tool)) => {
            let mut context = TeraContext::new();
            context.insert("tool", &tool);
            render_page(&state, StatusCode::OK, "tool.html", context, &vars)
        }
        Ok(None) => not_found(&state, &vars),
        Err(e) => server_error(&state, &vars, e),
    }
}

/// Everything `contact.html` needs besides the standard variables
#[derive(Debug, Default, Serialize)]
struct ContactView {
    values: FormData,
    errors: serde_json::Map<String, serde_json::Value>,
    notice: Option<String>,
    sent: bool,
}

fn contact_context(state: &AppState, view: &ContactView) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("form", view);
    context.insert("rules", state.contact_service.validator().rules());
    context.insert("token_field", TOKEN_FIELD);
    context.insert("token", &state.contact_service.issue_token());
    context.insert("honeypot_field", HONEYPOT_FIELD);
    context
}

async fn contact_form(State(state): State<AppState>, client: ClientInfo) -> Response {
    let vars = page_vars(&state, &client, "/contact/").await;
    let context = contact_context(&state, &ContactView::default());
    render_page(&state, StatusCode::OK, "contact.html", context, &vars)
}

/// POST /contact/ - plain form submit for clients without JavaScript
async fn contact_submit(State(state): State<AppState>, client: ClientInfo, Form(form): Form<FormData>) -> Response {
    let vars = page_vars(&state, &client, "/contact/").await;

    let (status, view) = match state.contact_service.submit(&form, &client.fingerprint).await {
        Ok(SubmitOutcome::Stored(_) | SubmitOutcome::Discarded) => (
            StatusCode::OK,
            ContactView {
                sent: true,
                notice: Some(crate::api::contact::THANK_YOU.to_string()),
                ..ContactView::default()
            },
        ),
        Err(ContactError::Validation(form_state)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ContactView {
                values: form.clone(),
                errors: match form_state.errors_json() {
                    serde_json::Value::Object(errors) => errors,
                    _ => serde_json::Map::new(),
                },
                notice: Some("Please correct the highlighted fields.".to_string()),
                sent: false,
            },
        ),
        Err(ContactError::InvalidToken(_)) => (
            StatusCode::BAD_REQUEST,
            ContactView {
                values: form.clone(),
                notice: Some("This form has expired. Please submit it again.".to_string()),
                ..ContactView::default()
            },
        ),
        Err(ContactError::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            ContactView {
                values: form.clone(),
                notice: Some("Too many messages. Please try again later.".to_string()),
                ..ContactView::default()
            },
        ),
        Err(e) => return server_error(&state, &vars, e),
    };

    render_page(&state, status, "contact.html", contact_context(&state, &view), &vars)
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub room: Option<String>,
}

async fn chat_page(State(state): State<AppState>, client: ClientInfo, Query(query): Query<ChatQuery>) -> Response {
    let vars = page_vars(&state, &client, "/chat/").await;
    if !state.chat_service.is_enabled() {
        return not_found(&state, &vars);
    }

    let room = query.room.unwrap_or_else(|| DEFAULT_ROOM.to_string());
    if !is_valid_room(&room) {
        return not_found(&state, &vars);
    }

    let messages = match state.chat_service.recent(&room, None).await {
        Ok(messages) => messages,
        Err(e) => return server_error(&state, &vars, e),
    };

    let mut context = TeraContext::new();
    context.insert("room", &room);
    context.insert("messages", &messages);
    context.insert("rules", state.chat_service.validator().rules());
    render_page(&state, StatusCode::OK, "chat.html", context, &vars)
}

/// Served from the service worker cache when the network is gone
async fn offline(State(state): State<AppState>, client: ClientInfo) -> Response {
    let vars = page_vars(&state, &client, "/offline/").await;
    render_page(&state, StatusCode::OK, "offline.html", TeraContext::new(), &vars)
}

// ============================================================================
// Admin skin
// ============================================================================

async fn session_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = extract_session_token(headers)?;
    match state.user_service.validate_session(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("session lookup failed: {e}");
            None
        }
    }
}

fn current_user(user: &User) -> CurrentUser {
    CurrentUser {
        id: user.id,
        username: user.username.clone(),
        role: user.role.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct DashboardCounts {
    posts: i64,
    published_posts: i64,
    tools: i64,
    messages: i64,
    unread_messages: i64,
    chat_messages: i64,
}

async fn dashboard_counts(state: &AppState) -> anyhow::Result<DashboardCounts> {
    Ok(DashboardCounts {
        posts: state.post_service.count().await?,
        published_posts: state.post_service.count_published().await?,
        tools: state.tool_service.count().await?,
        messages: state.contact_service.count().await?,
        unread_messages: state.contact_service.unread_count().await?,
        chat_messages: state.chat_service.count().await?,
    })
}

async fn admin_dashboard(State(state): State<AppState>, client: ClientInfo, headers: HeaderMap) -> Response {
    let user = match session_user(&state, &headers).await {
        Some(user) if user.is_admin() => user,
        _ => return Redirect::to("/admin/login/").into_response(),
    };
    let vars = page_vars(&state, &client, "/admin/").await.with_user(current_user(&user));

    let counts = match dashboard_counts(&state).await {
        Ok(counts) => counts,
        Err(e) => return server_error(&state, &vars, e),
    };

    let mut context = TeraContext::new();
    context.insert("counts", &counts);
    context.insert("theme", state.theme().current_theme());
    context.insert("total_requests", &state.request_stats.total_requests());
    context.insert("slow_requests", &state.request_stats.slow_requests());
    render_page(&state, StatusCode::OK, "admin/dashboard.html", context, &vars)
}

fn login_context(error: Option<&str>, username: &str) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("error", &error);
    context.insert("username", username);
    context
}

async fn admin_login_form(State(state): State<AppState>, client: ClientInfo, headers: HeaderMap) -> Response {
    if session_user(&state, &headers).await.is_some_and(|u| u.is_admin()) {
        return Redirect::to("/admin/").into_response();
    }
    let vars = page_vars(&state, &client, "/admin/login/").await;
    render_page(&state, StatusCode::OK, "admin/login.html", login_context(None, ""), &vars)
}

async fn admin_login(State(state): State<AppState>, client: ClientInfo, Form(form): Form<FormData>) -> Response {
    let vars = page_vars(&state, &client, "/admin/login/").await;
    let checked = FormValidator::login().validate(&form);
    let username = checked.value("username").to_string();

    if !checked.is_valid() {
        let context = login_context(Some("Enter your username and password."), &username);
        return render_page(&state, StatusCode::UNPROCESSABLE_ENTITY, "admin/login.html", context, &vars);
    }

    let input = LoginInput::new(&username, checked.value("password"));
    let failure = match login_user(&state, input, &client).await {
        Ok((user, token)) if user.is_admin() => {
            let cookie = session_cookie(&token, state.user_service.session_expiration_days());
            return ([(header::SET_COOKIE, cookie)], Redirect::to("/admin/")).into_response();
        }
        Ok((user, token)) => {
            tracing::warn!(user_id = user.id, "non-admin attempted dashboard login");
            if let Err(e) = state.user_service.logout(&token).await {
                tracing::warn!("failed to drop session: {e}");
            }
            (StatusCode::FORBIDDEN, "This account cannot access the dashboard.")
        }
        Err(e) if e.error.code == "RATE_LIMITED" => (StatusCode::TOO_MANY_REQUESTS, "Too many attempts. Please wait a few minutes."),
        Err(e) if e.error.code == "UNAUTHORIZED" => (StatusCode::UNAUTHORIZED, "Invalid username or password."),
        Err(e) => return server_error(&state, &vars, e.error.message),
    };

    let (status, message) = failure;
    render_page(&state, status, "admin/login.html", login_context(Some(message), &username), &vars)
}
