//! Outgoing email (contact form notifications)
//!
//! SMTP parameters live in the settings table. When no SMTP host or
//! recipient is configured, notifications are skipped.

use anyhow::{anyhow, Context, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repositories::SettingsRepository;
use crate::models::ContactMessage;
use crate::services::settings::keys;

/// SMTP settings resolved from the settings table
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpSettings {
    /// `None` unless a host and a sender address are set
    fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let get = |key: &str| map.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let host = get(keys::SMTP_HOST);
        let from = get(keys::SMTP_FROM);
        if host.is_empty() || from.is_empty() {
            return None;
        }

        Some(Self {
            host,
            port: get(keys::SMTP_PORT).parse().unwrap_or(587),
            username: get(keys::SMTP_USERNAME),
            password: map.get(keys::SMTP_PASSWORD).cloned().unwrap_or_default(),
            from,
        })
    }
}

pub struct EmailService {
    settings_repo: Arc<dyn SettingsRepository>,
}

impl EmailService {
    pub fn new(settings_repo: Arc<dyn SettingsRepository>) -> Self {
        Self { settings_repo }
    }

    async fn settings_map(&self) -> Result<HashMap<String, String>> {
        let all = self.settings_repo.get_all().await?;
        Ok(all.into_iter().map(|s| (s.key, s.value)).collect())
    }

    pub async fn smtp_settings(&self) -> Result<Option<SmtpSettings>> {
        Ok(SmtpSettings::from_map(&self.settings_map().await?))
    }

    /// Email the site owner about a new contact message.
    ///
    /// Returns `Ok(false)` when notifications are not configured.
    pub async fn notify_contact(&self, message: &ContactMessage) -> Result<bool> {
        let map = self.settings_map().await?;
        let Some(smtp) = SmtpSettings::from_map(&map) else {
            return Ok(false);
        };
        let recipient = map
            .get(keys::CONTACT_NOTIFY_EMAIL)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let Some(recipient) = recipient else {
            return Ok(false);
        };

        let site_name = map
            .get(keys::SITE_NAME)
            .cloned()
            .unwrap_or_else(|| "Folio".to_string());

        let email = build_contact_email(&smtp.from, &recipient, &site_name, message)?;
        self.send(&smtp, email).await?;
        Ok(true)
    }

    async fn send(&self, smtp: &SmtpSettings, email: Message) -> Result<()> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .context("Failed to create SMTP transport")?
            .port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()));
        }

        builder
            .build()
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {e}"))?;
        Ok(())
    }
}

fn build_contact_email(from: &str, to: &str, site_name: &str, message: &ContactMessage) -> Result<Message> {
    let subject = if message.subject.trim().is_empty() {
        format!("[{site_name}] New message from {}", message.name)
    } else {
        format!("[{site_name}] {}", message.subject.trim())
    };
    let body = format!(
        "From: {} <{}>\nReceived: {}\n\n{}\n",
        message.name,
        message.email,
        message.created_at.format("%Y-%m-%d %H:%M UTC"),
        message.body
    );

    Message::builder()
        .from(from.parse().map_err(|e| anyhow!("Invalid from address: {e}"))?)
        .to(to.parse().map_err(|e| anyhow!("Invalid recipient address: {e}"))?)
        .reply_to(
            message
                .email
                .parse()
                .map_err(|e| anyhow!("Invalid reply-to address: {e}"))?,
        )
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .context("Failed to build email")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message() -> ContactMessage {
        ContactMessage {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: String::new(),
            body: "Hello there".to_string(),
            is_read: false,
            fingerprint: "fp".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_smtp_settings_require_host_and_from() {
        let mut map = HashMap::new();
        assert!(SmtpSettings::from_map(&map).is_none());

        map.insert(keys::SMTP_HOST.to_string(), "smtp.example.com".to_string());
        assert!(SmtpSettings::from_map(&map).is_none());

        map.insert(keys::SMTP_FROM.to_string(), "site@example.com".to_string());
        let smtp = SmtpSettings::from_map(&map).unwrap();
        assert_eq!(smtp.port, 587);
        assert!(smtp.username.is_empty());
    }

    #[test]
    fn test_build_contact_email() {
        let email = build_contact_email("site@example.com", "me@example.com", "Folio", &message()).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: [Folio] New message from Ada"));
        assert!(raw.contains("Reply-To: ada@example.com"));
        assert!(raw.contains("Hello there"));
    }

    #[tokio::test]
    async fn test_notify_skipped_without_smtp() {
        use crate::db::repositories::SqlxSettingsRepository;
        use crate::db::{create_test_pool, migrations};

        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = EmailService::new(Arc::new(SqlxSettingsRepository::new(pool)));

        assert!(!service.notify_contact(&message()).await.unwrap());
    }
}
