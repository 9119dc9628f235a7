//! Chat messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message posted to a chat room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    /// Room slug, `[a-z0-9-]{1,32}`
    pub room: String,
    pub nickname: String,
    pub body: String,
    #[serde(skip)]
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// Validated chat message ready to persist
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub room: String,
    pub nickname: String,
    pub body: String,
    pub fingerprint: String,
}
