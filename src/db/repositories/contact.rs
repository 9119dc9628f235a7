//! Contact message repository

use crate::db::DynDatabasePool;
use crate::models::{ContactMessage, NewContactMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

use super::LastInsertId;

const CONTACT_COLUMNS: &str = "id, name, email, subject, body, is_read, fingerprint, created_at";

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, message: &NewContactMessage) -> Result<ContactMessage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactMessage>>;

    /// Newest first; with `unread_first` unread messages sort ahead of read ones
    async fn list(&self, offset: i64, limit: i64, unread_first: bool) -> Result<Vec<ContactMessage>>;

    async fn count(&self) -> Result<i64>;

    async fn count_unread(&self) -> Result<i64>;

    /// Submissions from a fingerprint since the given instant
    async fn count_since(&self, fingerprint: &str, since: DateTime<Utc>) -> Result<i64>;

    async fn mark_read(&self, id: i64, is_read: bool) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! contact_from_row {
    ($row:expr) => {{
        let row = $row;
        ContactMessage {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            is_read: row.try_get("is_read")?,
            fingerprint: row.try_get("fingerprint")?,
            created_at: row.try_get("created_at")?,
        }
    }};
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, message: &NewContactMessage) -> Result<ContactMessage> {
        let now = Utc::now();
        let id = with_backend!(self.pool, "contact.create", |p| {
            sqlx::query(
                "INSERT INTO contact_messages (name, email, subject, body, is_read, fingerprint, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&message.name)
            .bind(&message.email)
            .bind(&message.subject)
            .bind(&message.body)
            .bind(false)
            .bind(&message.fingerprint)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to store contact message")?
            .last_id()
        });

        Ok(ContactMessage {
            id,
            name: message.name.clone(),
            email: message.email.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            is_read: false,
            fingerprint: message.fingerprint.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactMessage>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contact_messages WHERE id = ?");
        with_backend!(self.pool, "contact.get_by_id", |p| {
            match sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get contact message")?
            {
                Some(row) => Ok(Some(contact_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, offset: i64, limit: i64, unread_first: bool) -> Result<Vec<ContactMessage>> {
        let order = if unread_first {
            "is_read ASC, created_at DESC, id DESC"
        } else {
            "created_at DESC, id DESC"
        };
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contact_messages ORDER BY {order} LIMIT ? OFFSET ?"
        );
        with_backend!(self.pool, "contact.list", |p| {
            let rows = sqlx::query(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list contact messages")?;
            let mut messages = Vec::with_capacity(rows.len());
            for row in &rows {
                messages.push(contact_from_row!(row));
            }
            Ok(messages)
        })
    }

    async fn count(&self) -> Result<i64> {
        with_backend!(self.pool, "contact.count", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM contact_messages")
                .fetch_one(p)
                .await
                .context("Failed to count contact messages")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn count_unread(&self) -> Result<i64> {
        with_backend!(self.pool, "contact.count_unread", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM contact_messages WHERE is_read = ?")
                .bind(false)
                .fetch_one(p)
                .await
                .context("Failed to count unread contact messages")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn count_since(&self, fingerprint: &str, since: DateTime<Utc>) -> Result<i64> {
        with_backend!(self.pool, "contact.count_since", |p| {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM contact_messages WHERE fingerprint = ? AND created_at >= ?",
            )
            .bind(fingerprint)
            .bind(since)
            .fetch_one(p)
            .await
            .context("Failed to count recent contact messages")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn mark_read(&self, id: i64, is_read: bool) -> Result<bool> {
        with_backend!(self.pool, "contact.mark_read", |p| {
            let result = sqlx::query("UPDATE contact_messages SET is_read = ? WHERE id = ?")
                .bind(is_read)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update contact message")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        with_backend!(self.pool, "contact.delete", |p| {
            let result = sqlx::query("DELETE FROM contact_messages WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete contact message")?;
            Ok(result.rows_affected() > 0)
        })
    }
}
