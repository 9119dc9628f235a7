//! Admin API endpoints
//!
//! All routes here sit behind `require_auth` + `require_admin`:
//! - GET /api/v1/admin/dashboard - Content and traffic counters
//! - GET /api/v1/admin/stats - Process and host resource usage
//! - GET/PUT /api/v1/admin/settings - Site settings
//! - GET /api/v1/admin/themes, POST /api/v1/admin/themes/switch, POST /api/v1/admin/themes/reload
//! - POST /api/v1/admin/cache/clear

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process;
use sysinfo::{Pid, System};

use crate::api::middleware::{ApiError, AppState};
use crate::cache::CacheLayer;
use crate::services::page_cache;
use crate::services::settings::keys;
use crate::theme::ThemeInfo;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const REDACTED: &str = "********";

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_posts: i64,
    pub published_posts: i64,
    pub total_tools: i64,
    pub total_messages: i64,
    pub unread_messages: i64,
    pub chat_messages: i64,
    pub total_users: i64,
    pub total_requests: u64,
    pub slow_requests: u64,
    pub server_errors: u64,
    pub slow_queries: u64,
}

#[derive(Debug, Serialize)]
pub struct SystemStatsResponse {
    pub version: String,
    pub memory_bytes: u64,
    pub memory_formatted: String,
    pub system_total_memory: u64,
    pub system_used_memory: u64,
    pub os_name: String,
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub cache_driver: String,
    pub database_driver: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ThemeSwitchRequest {
    pub theme: String,
}

#[derive(Debug, Serialize)]
pub struct ThemeListResponse {
    pub themes: Vec<ThemeInfo>,
    pub current: String,
}

#[derive(Debug, Serialize)]
pub struct ThemeSwitchResponse {
    pub current: String,
    pub used_fallback: bool,
    pub error: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/stats", get(system_stats))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/themes", get(list_themes))
        .route("/themes/switch", post(switch_theme))
        .route("/themes/reload", post(reload_theme))
        .route("/cache/clear", post(clear_cache))
}

/// GET /api/v1/admin/dashboard
async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = &state.request_stats;
    Ok(Json(DashboardResponse {
        total_posts: state.post_service.count().await?,
        published_posts: state.post_service.count_published().await?,
        total_tools: state.tool_service.count().await?,
        total_messages: state.contact_service.count().await?,
        unread_messages: state.contact_service.unread_count().await?,
        chat_messages: state.chat_service.count().await?,
        total_users: state.user_service.count().await?,
        total_requests: stats.total_requests(),
        slow_requests: stats.slow_requests(),
        server_errors: stats.server_errors(),
        slow_queries: crate::db::slow_query_count(),
    }))
}

/// GET /api/v1/admin/stats
async fn system_stats(State(state): State<AppState>) -> Json<SystemStatsResponse> {
    let mut sys = System::new_all();
    sys.refresh_all();

    let memory_bytes = sys
        .process(Pid::from_u32(process::id()))
        .map(|p| p.memory())
        .unwrap_or(0);
    let uptime_seconds = state.request_stats.uptime_seconds();

    Json(SystemStatsResponse {
        version: APP_VERSION.to_string(),
        memory_bytes,
        memory_formatted: format_bytes(memory_bytes),
        system_total_memory: sys.total_memory(),
        system_used_memory: sys.used_memory(),
        os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
        uptime_seconds,
        uptime_formatted: format_uptime(uptime_seconds),
        total_requests: state.request_stats.total_requests(),
        avg_response_time_ms: state.request_stats.avg_response_time_us() / 1000.0,
        cache_driver: state.cache.driver_name().to_string(),
        database_driver: format!("{:?}", state.pool.driver()).to_lowercase(),
    })
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// GET /api/v1/admin/settings - secret values are masked
async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
    Ok(Json(SettingsResponse {
        settings: state.settings_service.get_all_redacted().await?,
    }))
}

/// PUT /api/v1/admin/settings
///
/// A secret submitted back as its mask is left unchanged.
async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let updates = without_masked_secrets(body.settings);
    state.settings_service.set_many(&updates).await?;
    tracing::info!(keys = ?updates.keys().collect::<Vec<_>>(), "settings updated");

    Ok(Json(SettingsResponse {
        settings: state.settings_service.get_all_redacted().await?,
    }))
}

fn without_masked_secrets(mut settings: HashMap<String, String>) -> HashMap<String, String> {
    settings.retain(|key, value| !(keys::SECRET.contains(&key.as_str()) && value == REDACTED));
    settings
}

/// GET /api/v1/admin/themes
async fn list_themes(State(state): State<AppState>) -> Json<ThemeListResponse> {
    let engine = state.theme();
    Json(ThemeListResponse {
        themes: engine.list_themes(),
        current: engine.current_theme().to_string(),
    })
}

/// POST /api/v1/admin/themes/switch
async fn switch_theme(
    State(state): State<AppState>,
    Json(body): Json<ThemeSwitchRequest>,
) -> Result<Json<ThemeSwitchResponse>, ApiError> {
    let (result, current) = {
        let mut engine = state.theme_mut();
        let result = engine.set_theme_with_fallback(&body.theme);
        (result, engine.current_theme().to_string())
    };

    if !result.success {
        return Err(ApiError::validation_error(
            result.error.unwrap_or_else(|| format!("Theme '{}' could not be loaded", body.theme)),
        ));
    }
    page_cache::invalidate_all(&state.cache).await;

    Ok(Json(ThemeSwitchResponse {
        current,
        used_fallback: result.used_fallback,
        error: result.error,
    }))
}

/// POST /api/v1/admin/themes/reload
async fn reload_theme(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state
        .theme_mut()
        .reload_templates()
        .map_err(|e| ApiError::validation_error(format!("Failed to reload templates: {e}")))?;
    page_cache::invalidate_all(&state.cache).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/cache/clear
async fn clear_cache(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state
        .cache
        .clear()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    tracing::info!(driver = state.cache.driver_name(), "cache cleared");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(125), "2m");
        assert_eq!(format_uptime(3_720), "1h 2m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_masked_secret_is_not_written_back() {
        let mut settings = HashMap::new();
        settings.insert(keys::SMTP_PASSWORD.to_string(), REDACTED.to_string());
        settings.insert(keys::SITE_NAME.to_string(), "Mine".to_string());

        let kept = without_masked_secrets(settings);
        assert!(!kept.contains_key(keys::SMTP_PASSWORD));
        assert_eq!(kept.get(keys::SITE_NAME).map(String::as_str), Some("Mine"));
    }
}
