//! Contact form service
//!
//! Submissions pass four gates in order: the honeypot, the signed form
//! token, field validation and a per-fingerprint rate limit. Accepted
//! messages are stored and, when SMTP is configured, forwarded by email in
//! the background.

use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::db::repositories::ContactRepository;
use crate::models::{ContactMessage, ListParams, NewContactMessage, PagedResult};
use crate::services::email::EmailService;
use crate::services::form_token::{FormTokenError, FormTokenSigner};
use crate::services::validation::{FormData, FormState, FormValidator};

/// Hidden field that humans leave empty
pub const HONEYPOT_FIELD: &str = "website";
pub const TOKEN_FIELD: &str = "form_token";

/// Submissions allowed per fingerprint per window
pub const MAX_SUBMISSIONS: i64 = 5;
pub const SUBMISSION_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("Validation failed")]
    Validation(Box<FormState>),

    #[error("{0}")]
    InvalidToken(#[from] FormTokenError),

    #[error("Too many messages, please try again later")]
    RateLimited,

    #[error("Message not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// What happened to an accepted submission
#[derive(Debug)]
pub enum SubmitOutcome {
    Stored(ContactMessage),
    /// Honeypot was filled; the caller answers as if stored
    Discarded,
}

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
    email: Arc<EmailService>,
    signer: Option<FormTokenSigner>,
    validator: FormValidator,
}

impl ContactService {
    /// `signer` is `None` when form token checking is disabled
    pub fn new(
        repo: Arc<dyn ContactRepository>,
        email: Arc<EmailService>,
        signer: Option<FormTokenSigner>,
    ) -> Self {
        Self {
            repo,
            email,
            signer,
            validator: FormValidator::contact(),
        }
    }

    pub fn validator(&self) -> &FormValidator {
        &self.validator
    }

    /// Fresh token for rendering the form, if tokens are enabled
    pub fn issue_token(&self) -> Option<String> {
        self.signer.as_ref().map(FormTokenSigner::issue)
    }

    pub async fn submit(&self, form: &FormData, fingerprint: &str) -> Result<SubmitOutcome, ContactError> {
        if form.get(HONEYPOT_FIELD).is_some_and(|v| !v.trim().is_empty()) {
            tracing::info!(fingerprint, "contact honeypot filled, discarding");
            return Ok(SubmitOutcome::Discarded);
        }

        if let Some(signer) = &self.signer {
            let token = form.get(TOKEN_FIELD).map(String::as_str).unwrap_or("");
            signer.verify(token)?;
        }

        let state = self.validator.validate(form);
        if !state.is_valid() {
            return Err(ContactError::Validation(Box::new(state)));
        }

        let since = Utc::now() - Duration::minutes(SUBMISSION_WINDOW_MINUTES);
        let recent = self
            .repo
            .count_since(fingerprint, since)
            .await
            .context("Failed to count recent messages")?;
        if recent >= MAX_SUBMISSIONS {
            tracing::warn!(fingerprint, recent, "contact submissions rate limited");
            return Err(ContactError::RateLimited);
        }

        let message = self
            .repo
            .create(&NewContactMessage {
                name: state.value("name").to_string(),
                email: state.value("email").to_string(),
                subject: state.value("subject").to_string(),
                body: state.value("body").to_string(),
                fingerprint: fingerprint.to_string(),
            })
            .await
            .context("Failed to store contact message")?;
        tracing::info!(message_id = message.id, "contact message received");

        self.spawn_notification(message.clone());
        Ok(SubmitOutcome::Stored(message))
    }

    fn spawn_notification(&self, message: ContactMessage) {
        let email = self.email.clone();
        tokio::spawn(async move {
            match email.notify_contact(&message).await {
                Ok(true) => tracing::debug!(message_id = message.id, "contact notification sent"),
                Ok(false) => {}
                Err(e) => tracing::warn!(message_id = message.id, "contact notification failed: {e:#}"),
            }
        });
    }

    pub async fn list(
        &self,
        params: &ListParams,
        unread_first: bool,
    ) -> Result<PagedResult<ContactMessage>, ContactError> {
        let items = self
            .repo
            .list(params.offset(), params.limit(), unread_first)
            .await
            .context("Failed to list contact messages")?;
        let total = self.repo.count().await.context("Failed to count contact messages")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<ContactMessage, ContactError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get contact message")?
            .ok_or(ContactError::NotFound(id))
    }

    pub async fn mark_read(&self, id: i64, is_read: bool) -> Result<(), ContactError> {
        if !self.repo.mark_read(id, is_read).await.context("Failed to update message")? {
            return Err(ContactError::NotFound(id));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContactError> {
        if !self.repo.delete(id).await.context("Failed to delete message")? {
            return Err(ContactError::NotFound(id));
        }
        Ok(())
    }

    pub async fn unread_count(&self) -> Result<i64, ContactError> {
        Ok(self.repo.count_unread().await.context("Failed to count unread messages")?)
    }

    pub async fn count(&self) -> Result<i64, ContactError> {
        Ok(self.repo.count().await.context("Failed to count messages")?)
    }
}
