//! Chat message repository

use crate::db::DynDatabasePool;
use crate::models::{ChatMessage, NewChatMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

use super::LastInsertId;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn create(&self, message: &NewChatMessage) -> Result<ChatMessage>;

    /// The newest `limit` messages of a room, returned oldest first
    async fn recent(&self, room: &str, limit: i64) -> Result<Vec<ChatMessage>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Delete messages created before `cutoff`, returning how many were removed
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxChatRepository {
    pool: DynDatabasePool,
}

impl SqlxChatRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChatRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ChatRepository for SqlxChatRepository {
    async fn create(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        let now = Utc::now();
        let id = with_backend!(self.pool, "chat.create", |p| {
            sqlx::query(
                "INSERT INTO chat_messages (room, nickname, body, fingerprint, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&message.room)
            .bind(&message.nickname)
            .bind(&message.body)
            .bind(&message.fingerprint)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to store chat message")?
            .last_id()
        });

        Ok(ChatMessage {
            id,
            room: message.room.clone(),
            nickname: message.nickname.clone(),
            body: message.body.clone(),
            fingerprint: message.fingerprint.clone(),
            created_at: now,
        })
    }

    async fn recent(&self, room: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        let mut messages = with_backend!(self.pool, "chat.recent", |p| {
            let rows = sqlx::query(
                "SELECT id, room, nickname, body, fingerprint, created_at FROM chat_messages \
                 WHERE room = ? ORDER BY id DESC LIMIT ?",
            )
            .bind(room)
            .bind(limit)
            .fetch_all(p)
            .await
            .context("Failed to list chat messages")?;

            let mut messages = Vec::with_capacity(rows.len());
            for row in &rows {
                messages.push(ChatMessage {
                    id: row.try_get("id")?,
                    room: row.try_get("room")?,
                    nickname: row.try_get("nickname")?,
                    body: row.try_get("body")?,
                    fingerprint: row.try_get("fingerprint")?,
                    created_at: row.try_get("created_at")?,
                });
            }
            messages
        });
        messages.reverse();
        Ok(messages)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        with_backend!(self.pool, "chat.delete", |p| {
            let result = sqlx::query("DELETE FROM chat_messages WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete chat message")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        with_backend!(self.pool, "chat.delete_before", |p| {
            let result = sqlx::query("DELETE FROM chat_messages WHERE created_at < ?")
                .bind(cutoff)
                .execute(p)
                .await
                .context("Failed to prune chat messages")?;
            Ok(result.rows_affected())
        })
    }

    async fn count(&self) -> Result<i64> {
        with_backend!(self.pool, "chat.count", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM chat_messages")
                .fetch_one(p)
                .await
                .context("Failed to count chat messages")?;
            Ok(row.try_get("count")?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> SqlxChatRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxChatRepository::new(pool)
    }

    fn message(room: &str, body: &str) -> NewChatMessage {
        NewChatMessage {
            room: room.to_string(),
            nickname: "ada".to_string(),
            body: body.to_string(),
            fingerprint: "fp".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recent_returns_newest_oldest_first() {
        let repo = setup().await;
        for i in 0..5 {
            repo.create(&message("lobby", &format!("m{i}"))).await.unwrap();
        }
        repo.create(&message("other", "elsewhere")).await.unwrap();

        let bodies: Vec<String> = repo
            .recent("lobby", 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_delete_before_cutoff() {
        let repo = setup().await;
        repo.create(&message("lobby", "old")).await.unwrap();
        repo.create(&message("lobby", "also old")).await.unwrap();

        assert_eq!(repo.delete_before(Utc::now() - Duration::days(1)).await.unwrap(), 0);
        assert_eq!(repo.delete_before(Utc::now() + Duration::seconds(1)).await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup().await;
        let msg = repo.create(&message("lobby", "hi")).await.unwrap();
        assert!(repo.delete(msg.id).await.unwrap());
        assert!(!repo.delete(msg.id).await.unwrap());
    }
}
