//! Application assembly
//!
//! Wires repositories, services and the theme engine into an [`AppState`],
//! and owns the periodic maintenance tasks.

use anyhow::{Context, Result};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::api::middleware::{AppState, RequestStats};
use crate::cache::create_cache;
use crate::config::Config;
use crate::db::{
    self,
    repositories::{
        SqlxChatRepository, SqlxContactRepository, SqlxPostRepository, SqlxSessionRepository,
        SqlxSettingsRepository, SqlxToolRepository, SqlxUserRepository,
    },
    DynDatabasePool,
};
use crate::services::{
    form_token, ChatService, ContactService, EmailService, FormTokenSigner, MarkdownRenderer, PostService,
    SettingsService, ToolService, UserService,
};
use crate::theme::ThemeEngine;

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const CHAT_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Fill in a random form-token secret when none is configured.
///
/// Tokens issued with a generated secret do not survive a restart.
pub fn ensure_form_secret(config: &mut Config) -> Result<()> {
    if config.security.form_tokens && config.security.form_secret.is_empty() {
        config.security.form_secret = form_token::generate_secret()?;
        tracing::warn!("security.form_secret is empty, generated a per-process secret");
    }
    Ok(())
}

/// Connect to the database, run migrations and build the state.
pub async fn build_state(config: Config) -> Result<AppState> {
    let pool = db::create_pool(&config.database).await?;
    tracing::info!(driver = ?config.database.driver, "database connected");

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations completed");

    build_state_with_pool(config, pool).await
}

/// Build the state on an already migrated pool
pub async fn build_state_with_pool(config: Config, pool: DynDatabasePool) -> Result<AppState> {
    let cache = create_cache(&config.cache).await?;
    tracing::info!(driver = cache.driver_name(), "cache initialized");

    let renderer = MarkdownRenderer::new();
    let user_repo = Arc::new(SqlxUserRepository::new(pool.clone()));
    let settings_repo = Arc::new(SqlxSettingsRepository::new(pool.clone()));

    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        Arc::new(SqlxSessionRepository::new(pool.clone())),
    ));
    let post_service = Arc::new(PostService::new(
        Arc::new(SqlxPostRepository::new(pool.clone())),
        user_repo,
        cache.clone(),
        renderer.clone(),
    ));
    let tool_service = Arc::new(ToolService::new(
        Arc::new(SqlxToolRepository::new(pool.clone())),
        cache.clone(),
        renderer,
    ));

    let signer = config
        .security
        .form_tokens
        .then(|| FormTokenSigner::new(config.security.form_secret.clone()));
    let contact_service = Arc::new(ContactService::new(
        Arc::new(SqlxContactRepository::new(pool.clone())),
        Arc::new(EmailService::new(settings_repo.clone())),
        signer,
    ));
    let chat_service = Arc::new(ChatService::new(
        Arc::new(SqlxChatRepository::new(pool.clone())),
        config.chat.clone(),
    ));
    let settings_service = Arc::new(SettingsService::new(settings_repo, cache.clone()));

    let theme_engine = ThemeEngine::new(&config.theme.path, &config.theme.active, config.assets.cdn_url.clone())
        .context("Failed to initialize theme engine")?;
    tracing::info!(theme = theme_engine.current_theme(), "theme engine initialized");

    Ok(AppState {
        config: Arc::new(config),
        pool,
        cache,
        user_service,
        post_service,
        tool_service,
        contact_service,
        chat_service,
        settings_service,
        theme_engine: Arc::new(RwLock::new(theme_engine)),
        request_stats: Arc::new(RequestStats::new()),
    })
}

/// Start the periodic maintenance tasks
pub fn spawn_background_tasks(state: &AppState) {
    let users = state.user_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            users.cleanup_rate_limits().await;
        }
    });

    let users = state.user_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match users.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired sessions removed"),
                Err(e) => tracing::warn!("session cleanup failed: {e}"),
            }
        }
    });

    if state.chat_service.is_enabled() {
        let chat = state.chat_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CHAT_PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                match chat.prune().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "old chat messages pruned"),
                    Err(e) => tracing::warn!("chat pruning failed: {e}"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.theme.path = std::path::PathBuf::from("/nonexistent/themes");
        config
    }

    #[test]
    fn test_ensure_form_secret() {
        let mut config = test_config();
        config.security.form_secret.clear();
        ensure_form_secret(&mut config).unwrap();
        assert_eq!(config.security.form_secret.len(), 64);

        let before = config.security.form_secret.clone();
        ensure_form_secret(&mut config).unwrap();
        assert_eq!(config.security.form_secret, before, "an existing secret is kept");
    }

    #[tokio::test]
    async fn test_build_state_with_test_pool() {
        let pool = db::create_test_pool().await.unwrap();
        db::migrations::run_migrations(&pool).await.unwrap();

        let state = build_state_with_pool(test_config(), pool).await.unwrap();
        assert_eq!(state.theme().current_theme(), "default");
        assert_eq!(state.cache.driver_name(), "memory");
        assert_eq!(state.post_service.count().await.unwrap(), 0);
    }
}
