//! Session repository
//!
//! Login sessions keyed by opaque token.

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        with_backend!(self.pool, "sessions.create", |p| {
            sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
                .bind(&session.id)
                .bind(session.user_id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .execute(p)
                .await
                .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        with_backend!(self.pool, "sessions.get_by_id", |p| {
            let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get session")?;
            match row {
                Some(row) => Ok(Some(Session {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    expires_at: row.try_get("expires_at")?,
                    created_at: row.try_get("created_at")?,
                })),
                None => Ok(None),
            }
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        with_backend!(self.pool, "sessions.delete", |p| {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        with_backend!(self.pool, "sessions.delete_by_user", |p| {
            sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(p)
                .await
                .context("Failed to delete user sessions")?;
        });
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        with_backend!(self.pool, "sessions.delete_expired", |p| {
            let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(p)
                .await
                .context("Failed to delete expired sessions")?;
            Ok(result.rows_affected())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> (SqlxSessionRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES ('u', 'u@example.com', 'x', 'admin')",
        )
        .execute(pool.as_sqlite().expect("sqlite pool"))
        .await
        .expect("Failed to create user")
        .last_insert_rowid();
        (SqlxSessionRepository::new(pool), user_id)
    }

    fn session(id: &str, user_id: i64, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let (repo, user_id) = setup().await;
        repo.create(&session("tok", user_id, Duration::days(7))).await.unwrap();

        let found = repo.get_by_id("tok").await.unwrap().expect("session");
        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());

        repo.delete("tok").await.unwrap();
        assert!(repo.get_by_id("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_requires_user() {
        let (repo, user_id) = setup().await;
        assert!(repo
            .create(&session("orphan", user_id + 50, Duration::days(1)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_expired_and_by_user() {
        let (repo, user_id) = setup().await;
        repo.create(&session("old", user_id, Duration::seconds(-10))).await.unwrap();
        repo.create(&session("live", user_id, Duration::days(1))).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id("live").await.unwrap().is_some());

        repo.delete_by_user(user_id).await.unwrap();
        assert!(repo.get_by_id("live").await.unwrap().is_none());
    }
}
