//! Settings service
//!
//! Site-wide settings stored as key/value rows. The typed [`SiteSettings`]
//! view is cached and invalidated on every write.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::SettingsRepository;
use crate::services::page_cache;

const CACHE_KEY: &str = "settings:site";
const CACHE_TTL: Duration = Duration::from_secs(600);

/// Known setting keys
pub mod keys {
    pub const SITE_NAME: &str = "site_name";
    pub const SITE_DESCRIPTION: &str = "site_description";
    pub const SITE_AUTHOR: &str = "site_author";
    pub const POSTS_PER_PAGE: &str = "posts_per_page";
    pub const CONTACT_NOTIFY_EMAIL: &str = "contact_notify_email";

    pub const SMTP_HOST: &str = "smtp_host";
    pub const SMTP_PORT: &str = "smtp_port";
    pub const SMTP_USERNAME: &str = "smtp_username";
    pub const SMTP_PASSWORD: &str = "smtp_password";
    pub const SMTP_FROM: &str = "smtp_from";

    /// Keys whose values are never returned by the admin API
    pub const SECRET: &[&str] = &[SMTP_PASSWORD];
}

/// Typed view of the public site settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: String,
    pub site_author: String,
    pub posts_per_page: i64,
    pub contact_notify_email: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Folio".to_string(),
            site_description: "Writing, tools and experiments".to_string(),
            site_author: String::new(),
            posts_per_page: 10,
            contact_notify_email: String::new(),
        }
    }
}

impl SiteSettings {
    fn from_map(map: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, fallback: String| map.get(key).cloned().unwrap_or(fallback);

        Self {
            site_name: text(keys::SITE_NAME, defaults.site_name),
            site_description: text(keys::SITE_DESCRIPTION, defaults.site_description),
            site_author: text(keys::SITE_AUTHOR, defaults.site_author),
            posts_per_page: map
                .get(keys::POSTS_PER_PAGE)
                .and_then(|v| v.parse().ok())
                .filter(|n| (1..=100).contains(n))
                .unwrap_or(defaults.posts_per_page),
            contact_notify_email: text(keys::CONTACT_NOTIFY_EMAIL, defaults.contact_notify_email),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    cache: Arc<Cache>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    pub async fn get_site_settings(&self) -> Result<SiteSettings, SettingsServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<SiteSettings>(CACHE_KEY).await {
            return Ok(cached);
        }

        let map = self.get_all().await?;
        let settings = SiteSettings::from_map(&map);

        if let Err(e) = self.cache.set(CACHE_KEY, &settings, CACHE_TTL).await {
            tracing::debug!("failed to cache site settings: {e}");
        }
        Ok(settings)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, SettingsServiceError> {
        Ok(self.repo.get(key).await?.map(|s| s.value))
    }

    pub async fn get_all(&self) -> Result<HashMap<String, String>, SettingsServiceError> {
        let settings = self.repo.get_all().await?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// All settings with secret values blanked, for the admin API
    pub async fn get_all_redacted(&self) -> Result<HashMap<String, String>, SettingsServiceError> {
        let mut all = self.get_all().await?;
        for key in keys::SECRET {
            if let Some(value) = all.get_mut(*key) {
                if !value.is_empty() {
                    *value = "********".to_string();
                }
            }
        }
        Ok(all)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), SettingsServiceError> {
        let mut map = HashMap::new();
        map.insert(key.to_string(), value.to_string());
        self.set_many(&map).await
    }

    /// Validate and store several settings, then drop the cached view
    pub async fn set_many(&self, settings: &HashMap<String, String>) -> Result<(), SettingsServiceError> {
        for (key, value) in settings {
            validate_setting(key, value)?;
        }

        self.repo.set_many(settings).await?;
        self.invalidate().await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), SettingsServiceError> {
        self.repo.delete(key).await?;
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete(CACHE_KEY).await {
            tracing::warn!("failed to invalidate settings cache: {e}");
        }
        page_cache::invalidate_all(&self.cache).await;
    }
}

fn validate_setting(key: &str, value: &str) -> Result<(), SettingsServiceError> {
    let key_ok = !key.is_empty()
        && key.len() <= 64
        && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !key_ok {
        return Err(SettingsServiceError::InvalidValue(format!("invalid key '{key}'")));
    }

    match key {
        keys::POSTS_PER_PAGE => match value.parse::<i64>() {
            Ok(n) if (1..=100).contains(&n) => Ok(()),
            _ => Err(SettingsServiceError::InvalidValue(
                "posts_per_page must be between 1 and 100".to_string(),
            )),
        },
        keys::SMTP_PORT if !value.is_empty() => value
            .parse::<u16>()
            .map(|_| ())
            .map_err(|_| SettingsServiceError::InvalidValue("smtp_port must be a port number".to_string())),
        keys::SITE_NAME if value.trim().is_empty() => Err(SettingsServiceError::InvalidValue(
            "site_name cannot be empty".to_string(),
        )),
        _ => Ok(()),
    }
}
