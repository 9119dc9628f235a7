//! Contact form messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message submitted through the contact form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Optional; empty when not supplied
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    /// Hashed client identity, used for rate limiting
    #[serde(skip_serializing)]
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// Validated contact message ready to persist
#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub fingerprint: String,
}
