//! Chat service
//!
//! Public rooms with short messages. New messages are persisted and fanned
//! out to live subscribers over per-room broadcast channels.

use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::ChatConfig;
use crate::db::repositories::ChatRepository;
use crate::models::{ChatMessage, NewChatMessage};
use crate::services::rate_limiter::SlidingWindowLimiter;
use crate::services::validation::{FormData, FormState, FormValidator};

pub const DEFAULT_ROOM: &str = "lobby";

/// Messages allowed per fingerprint per minute
pub const MAX_MESSAGES_PER_MINUTE: usize = 10;

/// Buffered events per room before slow subscribers start lagging
const CHANNEL_CAPACITY: usize = 64;

static ROOM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]{1,32}$").unwrap_or_else(|e| panic!("invalid room regex: {e}")));

pub fn is_valid_room(room: &str) -> bool {
    ROOM_RE.is_match(room)
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat is disabled")]
    Disabled,

    #[error("Invalid room name: {0}")]
    InvalidRoom(String),

    #[error("Validation failed")]
    Validation(Box<FormState>),

    #[error("Slow down, too many messages")]
    RateLimited,

    #[error("Message not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Event pushed to live subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message(ChatMessage),
    Deleted { id: i64 },
}

impl ChatEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Message(_) => "message",
            ChatEvent::Deleted { .. } => "deleted",
        }
    }
}

pub struct ChatService {
    repo: Arc<dyn ChatRepository>,
    config: ChatConfig,
    validator: FormValidator,
    limiter: SlidingWindowLimiter<String>,
    channels: RwLock<HashMap<String, broadcast::Sender<ChatEvent>>>,
}

impl ChatService {
    pub fn new(repo: Arc<dyn ChatRepository>, config: ChatConfig) -> Self {
        Self {
            repo,
            config,
            validator: FormValidator::chat(),
            limiter: SlidingWindowLimiter::new(MAX_MESSAGES_PER_MINUTE, Duration::minutes(1)),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn validator(&self) -> &FormValidator {
        &self.validator
    }

    fn check_room(&self, room: &str) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if !is_valid_room(room) {
            return Err(ChatError::InvalidRoom(room.to_string()));
        }
        Ok(())
    }

    /// Validate, rate limit, store and broadcast a message
    pub async fn post(&self, room: &str, form: &FormData, fingerprint: &str) -> Result<ChatMessage, ChatError> {
        self.check_room(room)?;

        let state = self.validator.validate(form);
        if !state.is_valid() {
            return Err(ChatError::Validation(Box::new(state)));
        }

        if !self.limiter.try_acquire(fingerprint.to_string()).await {
            return Err(ChatError::RateLimited);
        }

        let message = self
            .repo
            .create(&NewChatMessage {
                room: room.to_string(),
                nickname: state.value("nickname").to_string(),
                body: state.value("body").to_string(),
                fingerprint: fingerprint.to_string(),
            })
            .await
            .context("Failed to store chat message")?;

        self.publish(room, ChatEvent::Message(message.clone())).await;
        Ok(message)
    }

    /// Newest messages of a room, oldest first. `limit` is capped by the
    /// configured history limit.
    pub async fn recent(&self, room: &str, limit: Option<i64>) -> Result<Vec<ChatMessage>, ChatError> {
        self.check_room(room)?;
        let max = self.config.history_limit;
        let limit = limit.unwrap_or(max).clamp(1, max);
        Ok(self.repo.recent(room, limit).await.context("Failed to load chat history")?)
    }

    /// Live events for a room
    pub async fn subscribe(&self, room: &str) -> Result<broadcast::Receiver<ChatEvent>, ChatError> {
        self.check_room(room)?;

        if let Some(sender) = self.channels.read().await.get(room) {
            return Ok(sender.subscribe());
        }
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }

    async fn publish(&self, room: &str, event: ChatEvent) {
        if let Some(sender) = self.channels.read().await.get(room) {
            // No receivers is fine
            let _ = sender.send(event);
        }
    }

    /// Moderation: delete a message and tell every room's subscribers
    pub async fn delete(&self, id: i64) -> Result<(), ChatError> {
        if !self.repo.delete(id).await.context("Failed to delete chat message")? {
            return Err(ChatError::NotFound(id));
        }
        tracing::info!(message_id = id, "chat message deleted");

        for sender in self.channels.read().await.values() {
            let _ = sender.send(ChatEvent::Deleted { id });
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ChatError> {
        Ok(self.repo.count().await.context("Failed to count chat messages")?)
    }

    /// Delete messages past the retention window and drop idle channels.
    /// Returns the number of deleted messages.
    pub async fn prune(&self) -> Result<u64, ChatError> {
        let cutoff = Some(self.config.retention_days)
            .filter(|days| *days >= 1)
            .and_then(Duration::try_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| anyhow::anyhow!("invalid chat retention of {} days", self.config.retention_days))?;
        let deleted = self
            .repo
            .delete_before(cutoff)
            .await
            .context("Failed to prune chat messages")?;

        self.channels
            .write()
            .await
            .retain(|_, sender| sender.receiver_count() > 0);
        self.limiter.cleanup().await;

        if deleted > 0 {
            tracing::info!(deleted, "pruned old chat messages");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxChatRepository;
    use crate::db::{create_test_pool, migrations};

    async fn service(config: ChatConfig) -> ChatService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        ChatService::new(SqlxChatRepository::boxed(pool), config)
    }

    fn msg(nickname: &str, body: &str) -> FormData {
        [("nickname", nickname), ("body", body)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_room_names() {
        assert!(is_valid_room("lobby"));
        assert!(is_valid_room("rust-2024"));
        assert!(!is_valid_room(""));
        assert!(!is_valid_room("Lobby"));
        assert!(!is_valid_room("has space"));
        assert!(!is_valid_room(&"a".repeat(33)));
    }

    #[tokio::test]
    async fn test_post_and_recent() {
        let svc = service(ChatConfig::default()).await;
        svc.post("lobby", &msg("ada", "first"), "fp").await.unwrap();
        svc.post("lobby", &msg("bob", " second "), "fp2").await.unwrap();
        svc.post("other", &msg("eve", "elsewhere"), "fp3").await.unwrap();

        let recent = svc.recent("lobby", None).await.unwrap();
        let bodies: Vec<_> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);

        let last = svc.recent("lobby", Some(1)).await.unwrap();
        assert_eq!(last[0].body, "second");
    }

    #[tokio::test]
    async fn test_validation_and_room_checks() {
        let svc = service(ChatConfig::default()).await;
        assert!(matches!(svc.post("Bad Room", &msg("a", "b"), "fp").await, Err(ChatError::InvalidRoom(_))));
        assert!(matches!(svc.post("lobby", &msg("", "b"), "fp").await, Err(ChatError::Validation(_))));
        assert!(matches!(
            svc.post("lobby", &msg("a", &"x".repeat(501)), "fp").await,
            Err(ChatError::Validation(_))
        ));
        assert!(svc.post("lobby", &msg(&"n".repeat(32), &"x".repeat(500)), "fp").await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let svc = service(ChatConfig::default()).await;
        for i in 0..MAX_MESSAGES_PER_MINUTE {
            svc.post("lobby", &msg("spam", &i.to_string()), "fp").await.unwrap();
        }
        assert!(matches!(svc.post("lobby", &msg("spam", "more"), "fp").await, Err(ChatError::RateLimited)));
        assert!(svc.post("lobby", &msg("calm", "hi"), "other").await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled() {
        let svc = service(ChatConfig {
            enabled: false,
            ..ChatConfig::default()
        })
        .await;
        assert!(matches!(svc.post("lobby", &msg("a", "b"), "fp").await, Err(ChatError::Disabled)));
        assert!(matches!(svc.recent("lobby", None).await, Err(ChatError::Disabled)));
        assert!(matches!(svc.subscribe("lobby").await, Err(ChatError::Disabled)));
    }

    #[tokio::test]
    async fn test_subscribers_receive_messages_and_deletions() {
        let svc = service(ChatConfig::default()).await;
        let mut rx = svc.subscribe("lobby").await.unwrap();
        let mut other_rx = svc.subscribe("other").await.unwrap();

        let message = svc.post("lobby", &msg("ada", "live"), "fp").await.unwrap();
        match rx.recv().await.unwrap() {
            ChatEvent::Message(m) => assert_eq!(m.body, "live"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(other_rx.try_recv().is_err());

        svc.delete(message.id).await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), ChatEvent::Deleted { id } if id == message.id));
        assert!(matches!(other_rx.recv().await.unwrap(), ChatEvent::Deleted { .. }));
        assert!(matches!(svc.delete(message.id).await, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_prune_drops_idle_channels() {
        let svc = service(ChatConfig::default()).await;
        {
            let _rx = svc.subscribe("lobby").await.unwrap();
        }
        svc.post("lobby", &msg("ada", "recent"), "fp").await.unwrap();

        assert_eq!(svc.prune().await.unwrap(), 0);
        assert!(svc.channels.read().await.is_empty());
        assert_eq!(svc.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_rejects_out_of_range_retention() {
        for retention_days in [-1, 0, i64::MAX] {
            let svc = service(ChatConfig {
                retention_days,
                ..ChatConfig::default()
            })
            .await;
            svc.post("lobby", &msg("ada", "just now"), "fp").await.unwrap();

            assert!(matches!(svc.prune().await, Err(ChatError::Internal(_))), "{retention_days}");
            assert_eq!(svc.count().await.unwrap(), 1);
        }
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ChatEvent::Deleted { id: 7 }).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["id"], 7);
    }
}
