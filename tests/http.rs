//! End-to-end HTTP tests against the full router on in-memory SQLite.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use folio::api::{build_router, AppState};
use folio::app::build_state_with_pool;
use folio::config::Config;
use folio::db::{self, migrations::run_migrations};
use folio::models::{CreatePostInput, CreateUserInput, User, UserRole};

const ADMIN_PASSWORD: &str = "correct horse battery";

fn test_config() -> Config {
    let mut config = Config::default();
    config.theme.path = std::path::PathBuf::from("/nonexistent/themes");
    config.security.form_tokens = false;
    config.chat.enabled = true;
    config
}

async fn test_state(config: Config) -> AppState {
    let pool = db::create_test_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();
    build_state_with_pool(config, pool).await.unwrap()
}

async fn test_server() -> (TestServer, AppState) {
    let state = test_state(test_config()).await;
    let server = TestServer::new(build_router(state.clone())).unwrap();
    (server, state)
}

async fn create_user(state: &AppState, username: &str, role: UserRole) -> User {
    state
        .user_service
        .create_user(CreateUserInput {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: ADMIN_PASSWORD.to_string(),
            role,
        })
        .await
        .unwrap()
}

async fn login(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": username, "password": ADMIN_PASSWORD }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["token"].as_str().unwrap().to_string()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_health_endpoints() {
    let (server, _) = test_server().await;

    for path in ["/health", "/health/"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"]["database"]["status"], "ok");
        assert_eq!(body["checks"]["cache"]["driver"], "memory");
    }

    let response = server.get("/health/readiness/").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ready");

    let response = server.get("/health/liveness").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "status": "alive" }));
}

#[tokio::test]
async fn test_health_reports_degraded_when_database_is_down() {
    let (server, state) = test_server().await;
    state.pool.close().await;

    let response = server.get("/health/").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"]["status"], "error");
    assert!(body["checks"]["database"]["error"].is_string());
    assert_eq!(body["checks"]["cache"]["status"], "ok");

    let response = server.get("/health/readiness").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "not_ready");

    server.get("/health/liveness/").await.assert_status_ok();
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (server, _) = test_server().await;

    for path in ["/", "/health", "/static/css/site.css", "/does-not-exist/"] {
        let response = server.get(path).await;
        assert_eq!(response.header("x-content-type-options"), "nosniff", "{path}");
        assert_eq!(response.header("x-frame-options"), "DENY", "{path}");
        assert!(response.headers().contains_key("content-security-policy"), "{path}");
        assert!(response.headers().contains_key("server-timing"), "{path}");
    }
}

#[tokio::test]
async fn test_unknown_page_renders_404() {
    let (server, _) = test_server().await;
    let response = server.get("/nope/").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.text().contains("404"));
}

#[tokio::test]
async fn test_admin_post_lifecycle_and_public_views() {
    let (server, state) = test_server().await;
    create_user(&state, "admin", UserRole::Admin).await;
    let token = login(&server, "admin").await;

    let response = server
        .post("/api/v1/admin/posts")
        .add_header("authorization", bearer(&token))
        .json(&json!({ "title": "Hello World", "body": "Some *markdown* here." }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let post = response.json::<Value>();
    assert_eq!(post["slug"], "hello-world");
    let id = post["id"].as_i64().unwrap();

    // Drafts stay private
    server.get("/api/v1/posts/hello-world").await.assert_status(StatusCode::NOT_FOUND);
    server.get("/blog/hello-world/").await.assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/v1/admin/posts/{id}/publish"))
        .add_header("authorization", bearer(&token))
        .await
        .assert_status_ok();

    let response = server.get("/api/v1/posts/hello-world").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["reading_time_minutes"], 1);

    let page = server.get("/blog/hello-world/").await;
    page.assert_status_ok();
    assert!(page.text().contains("<em>markdown</em>"));

    let list = server.get("/api/v1/posts").await.json::<Value>();
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let (server, state) = test_server().await;
    create_user(&state, "writer", UserRole::Author).await;

    server.get("/api/v1/admin/dashboard").await.assert_status(StatusCode::UNAUTHORIZED);

    let token = login(&server, "writer").await;
    server
        .get("/api/v1/admin/dashboard")
        .add_header("authorization", bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Signed-in but non-admin users still reach their own account routes
    let me = server
        .get("/api/v1/auth/me")
        .add_header("authorization", bearer(&token))
        .await;
    me.assert_status_ok();
    assert_eq!(me.json::<Value>()["role"], "author");
}

#[tokio::test]
async fn test_admin_dashboard_redirects_without_session() {
    let (server, _) = test_server().await;
    let response = server.get("/admin/").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/admin/login/");

    server.get("/admin/login/").await.assert_status_ok();
}

#[tokio::test]
async fn test_admin_login_form_sets_cookie() {
    let (server, state) = test_server().await;
    create_user(&state, "admin", UserRole::Admin).await;

    let response = server
        .post("/admin/login/")
        .form(&[("username", "admin"), ("password", ADMIN_PASSWORD)])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    let cookie = response.header("set-cookie");
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let response = server
        .post("/admin/login/")
        .form(&[("username", "admin"), ("password", "wrong")])
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(response.text().contains("Invalid username or password."));
}

#[tokio::test]
async fn test_contact_submission_validation_and_honeypot() {
    let (server, state) = test_server().await;

    let response = server
        .post("/api/v1/contact")
        .json(&json!({ "name": "", "email": "not-an-email", "body": "Hi" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error = response.json::<Value>();
    assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(error["error"]["details"]["name"]["code"], "required");
    assert_eq!(error["error"]["details"]["email"]["code"], "invalid_email");

    let response = server
        .post("/api/v1/contact")
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "body": "Hello there", "website": "spam" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(state.contact_service.count().await.unwrap(), 0, "honeypot submissions are discarded");

    let response = server
        .post("/api/v1/contact")
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "body": "Hello there" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(state.contact_service.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_contact_form_page_rerenders_errors() {
    let (server, _) = test_server().await;

    let response = server
        .post("/contact/")
        .form(&[("name", "Ada"), ("email", "nope"), ("body", "")])
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let html = response.text();
    assert!(html.contains("Please enter a valid email address."));
    assert!(html.contains("value=\"Ada\""));
}

#[tokio::test]
async fn test_contact_requires_token_when_enabled() {
    let mut config = test_config();
    config.security.form_tokens = true;
    config.security.form_secret = "test-secret".to_string();
    let state = test_state(config).await;
    let server = TestServer::new(build_router(state)).unwrap();

    let message = json!({ "name": "Ada", "email": "ada@example.com", "body": "Hello there" });
    server.post("/api/v1/contact").json(&message).await.assert_status(StatusCode::BAD_REQUEST);

    let form = server.get("/api/v1/contact/form").await.json::<Value>();
    let token = form["token"].as_str().unwrap();
    let mut signed = message.clone();
    signed["form_token"] = json!(token);
    server.post("/api/v1/contact").json(&signed).await.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_chat_post_and_history() {
    let (server, _) = test_server().await;

    let response = server
        .post("/api/v1/chat/rooms/lobby/messages")
        .json(&json!({ "nickname": "ada", "body": "hello" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let history = server.get("/api/v1/chat/rooms/lobby/messages").await.json::<Value>();
    assert_eq!(history["messages"].as_array().unwrap().len(), 1);
    assert_eq!(history["messages"][0]["body"], "hello");
    assert!(history["messages"][0].get("fingerprint").is_none());

    server
        .post("/api/v1/chat/rooms/Bad_Room/messages")
        .json(&json!({ "nickname": "ada", "body": "hello" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_disabled_hides_everything() {
    let mut config = test_config();
    config.chat.enabled = false;
    let state = test_state(config).await;
    let server = TestServer::new(build_router(state)).unwrap();

    server.get("/chat/").await.assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/v1/chat/rooms/lobby/messages")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_assets_and_pwa_files() {
    let (server, _) = test_server().await;

    let response = server.get("/static/css/site.css").await;
    response.assert_status_ok();
    assert_eq!(response.header("cache-control"), "public, max-age=31536000, immutable");
    let etag = response.header("etag");

    let response = server.get("/static/css/site.css").add_header("if-none-match", etag).await;
    response.assert_status(StatusCode::NOT_MODIFIED);

    let response = server.get("/sw.js").await;
    response.assert_status_ok();
    assert_eq!(response.header("service-worker-allowed"), "/");

    let response = server.get("/manifest.webmanifest").await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "application/manifest+json");

    server.get("/robots.txt").await.assert_status_ok();
}

#[tokio::test]
async fn test_public_pages_are_cached_per_effects_mode() {
    let (server, _) = test_server().await;

    let first = server.get("/").await;
    first.assert_status_ok();
    assert_eq!(first.header("x-page-cache"), "MISS");

    let second = server.get("/").await;
    assert_eq!(second.header("x-page-cache"), "HIT");
    assert_eq!(first.text(), second.text());

    let reduced = server
        .get("/")
        .add_header("sec-ch-prefers-reduced-motion", "reduce")
        .await;
    assert_eq!(reduced.header("x-page-cache"), "MISS");
    assert!(reduced.text().contains("data-effects=\"simplified\""));

    let revalidated = server.get("/").add_header("if-none-match", first.header("etag")).await;
    revalidated.assert_status(StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_settings_are_redacted_and_public_info_hides_email() {
    let (server, state) = test_server().await;
    create_user(&state, "admin", UserRole::Admin).await;
    let token = login(&server, "admin").await;

    server
        .put("/api/v1/admin/settings")
        .add_header("authorization", bearer(&token))
        .json(&json!({ "settings": {
            "site_name": "Ada's Folio",
            "smtp_password": "hunter2",
            "contact_notify_email": "ada@example.com"
        }}))
        .await
        .assert_status_ok();

    let settings = server
        .get("/api/v1/admin/settings")
        .add_header("authorization", bearer(&token))
        .await
        .json::<Value>();
    assert_eq!(settings["settings"]["smtp_password"], "********");

    let info = server.get("/api/v1/site/info").await;
    let text = info.text();
    assert!(text.contains("Ada's Folio"));
    assert!(!text.contains("ada@example.com"));
}

#[tokio::test]
async fn test_oversized_pages_are_served_uncached() {
    let (server, state) = test_server().await;
    let author = create_user(&state, "admin", UserRole::Admin).await;
    let post = state
        .post_service
        .create(
            author.id,
            CreatePostInput {
                title: "Long Read".to_string(),
                slug: String::new(),
                excerpt: Some("A very long post".to_string()),
                body: "lorem ipsum ".repeat(200_000),
                status: None,
            },
        )
        .await
        .unwrap();
    state.post_service.publish(post.id).await.unwrap();

    for _ in 0..2 {
        let response = server.get("/blog/long-read/").await;
        response.assert_status_ok();
        assert!(response.text().len() > 2 * 1024 * 1024);
        assert!(response.headers().get("x-page-cache").is_none());
    }
}
