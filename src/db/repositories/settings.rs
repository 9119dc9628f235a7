//! Settings repository
//!
//! Key/value site settings (site name, description, SMTP, ...).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::collections::HashMap;

use crate::db::{Backend, DynDatabasePool, QueryTimer};

/// A setting key-value pair
#[derive(Debug, Clone)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    async fn get_all(&self) -> Result<Vec<Setting>>;

    /// Insert or overwrite a setting
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()> {
        for (key, value) in settings {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }
}

macro_rules! setting_from_row {
    ($row:expr) => {{
        let row = $row;
        Setting {
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        with_backend!(self.pool, "settings.get", |p| {
            match sqlx::query("SELECT `key`, value, updated_at FROM settings WHERE `key` = ?")
                .bind(key)
                .fetch_optional(p)
                .await
                .context("Failed to read setting")?
            {
                Some(row) => Ok(Some(setting_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        with_backend!(self.pool, "settings.get_all", |p| {
            let rows = sqlx::query("SELECT `key`, value, updated_at FROM settings ORDER BY `key`")
                .fetch_all(p)
                .await
                .context("Failed to read settings")?;
            let mut settings = Vec::with_capacity(rows.len());
            for row in &rows {
                settings.push(setting_from_row!(row));
            }
            Ok(settings)
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _timer = QueryTimer::start("settings.set");
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(
                    "INSERT INTO settings (`key`, value, updated_at) VALUES (?, ?, ?) \
                     ON CONFLICT(`key`) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to write setting")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(
                    "INSERT INTO settings (`key`, value, updated_at) VALUES (?, ?, ?) \
                     ON DUPLICATE KEY UPDATE value = VALUES(value), updated_at = VALUES(updated_at)",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to write setting")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        with_backend!(self.pool, "settings.delete", |p| {
            sqlx::query("DELETE FROM settings WHERE `key` = ?")
                .bind(key)
                .execute(p)
                .await
                .context("Failed to delete setting")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxSettingsRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxSettingsRepository::new(pool)
    }

    #[tokio::test]
    async fn test_seeded_defaults_readable() {
        let repo = setup().await;
        let name = repo.get("site_name").await.unwrap().expect("seeded");
        assert_eq!(name.value, "Folio");
        assert!(repo.get_all().await.unwrap().len() >= 5);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let repo = setup().await;
        repo.set("site_name", "Mine").await.unwrap();
        repo.set("smtp_host", "smtp.example.dev").await.unwrap();

        assert_eq!(repo.get("site_name").await.unwrap().unwrap().value, "Mine");
        assert_eq!(repo.get("smtp_host").await.unwrap().unwrap().value, "smtp.example.dev");
    }

    #[tokio::test]
    async fn test_set_many_and_delete() {
        let repo = setup().await;
        let mut values = HashMap::new();
        values.insert("a".to_string(), "1".to_string());
        values.insert("b".to_string(), "2".to_string());
        repo.set_many(&values).await.unwrap();

        repo.delete("a").await.unwrap();
        assert!(repo.get("a").await.unwrap().is_none());
        assert_eq!(repo.get("b").await.unwrap().unwrap().value, "2");
    }
}
