//! Public site information API
//!
//! - GET /api/v1/site/info - Site name, description and feature flags
//!
//! The notification address from the settings is never exposed here.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::services::SiteSettings;

#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub version: String,
    pub site_name: String,
    pub site_description: String,
    pub site_author: String,
    pub posts_per_page: i64,
    pub chat_enabled: bool,
    pub theme: String,
}

impl SiteInfoResponse {
    fn new(settings: SiteSettings, chat_enabled: bool, theme: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            site_name: settings.site_name,
            site_description: settings.site_description,
            site_author: settings.site_author,
            posts_per_page: settings.posts_per_page,
            chat_enabled,
            theme,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/info", get(get_site_info))
}

/// GET /api/v1/site/info
///
/// Falls back to default settings when storage is unavailable.
async fn get_site_info(State(state): State<AppState>) -> Json<SiteInfoResponse> {
    let settings = state.settings_service.get_site_settings().await.unwrap_or_else(|e| {
        tracing::warn!("failed to load site settings: {e}");
        SiteSettings::default()
    });
    let theme = state.theme().current_theme().to_string();

    Json(SiteInfoResponse::new(settings, state.chat_service.is_enabled(), theme))
}
