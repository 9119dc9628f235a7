//! User service
//!
//! Admin accounts and sessions:
//! - accounts are created by the management command
//! - login by username or email, rate limited per username and per IP
//! - sessions are opaque UUID tokens valid for seven days

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::validation::is_valid_email;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Too many login attempts, please try again later")]
    RateLimited,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(alias = "username")]
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    limiter: LoginRateLimiter,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self {
            user_repo,
            session_repo,
            limiter: LoginRateLimiter::new(),
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    pub fn session_expiration_days(&self) -> i64 {
        self.session_expiration_days
    }

    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim();
        let email = input.email.trim().to_lowercase();

        validate_username(username)?;
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError("Invalid email address".to_string()));
        }
        validate_password(&input.password)?;

        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(username.to_string()));
        }
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(email));
        }

        let now = Utc::now();
        let user = User {
            id: 0,
            username: username.to_string(),
            email,
            password_hash: hash_password(&input.password)?,
            role: input.role,
            created_at: now,
            updated_at: now,
        };

        let user = self.user_repo.create(&user).await.context("Failed to create user")?;
        tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "user created");
        Ok(user)
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown users and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput, ip: Option<IpAddr>) -> Result<Session, UserServiceError> {
        let login = input.username_or_email.trim();

        if let Some(ip) = ip {
            if self.limiter.is_ip_limited(ip).await {
                return Err(UserServiceError::RateLimited);
            }
            self.limiter.record_ip_request(ip).await;
        }
        if self.limiter.is_username_limited(login).await {
            return Err(UserServiceError::RateLimited);
        }

        let user = match self.find_user(login).await? {
            Some(user) if verify_password(&input.password, &user.password_hash)? => user,
            _ => {
                self.limiter.record_failed_attempt(login).await;
                tracing::warn!(login, "failed login attempt");
                return Err(UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
            }
        };

        self.limiter.clear_username_attempts(login).await;
        let session = self.create_session(user.id).await?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(session)
    }

    async fn find_user(&self, login: &str) -> Result<Option<User>, UserServiceError> {
        let user = if login.contains('@') {
            self.user_repo.get_by_email(&login.to_lowercase()).await
        } else {
            self.user_repo.get_by_username(login).await
        };
        Ok(user.context("Failed to look up user")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };
        Ok(self.session_repo.create(&session).await.context("Failed to create session")?)
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo.delete(token).await.context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a live session token; expired sessions are removed
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        Ok(self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?)
    }

    /// Change a password after checking the current one. All sessions of
    /// the user are closed.
    pub async fn change_password(&self, user_id: i64, current: &str, new: &str) -> Result<(), UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::AuthenticationError("Unknown user".to_string()))?;

        if !verify_password(current, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError("Current password is incorrect".to_string()));
        }
        validate_password(new)?;

        self.user_repo
            .update_password(user_id, &hash_password(new)?)
            .await
            .context("Failed to update password")?;
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to close sessions")?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    pub async fn count(&self) -> Result<i64, UserServiceError> {
        Ok(self.user_repo.count().await.context("Failed to count users")?)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    pub async fn cleanup_rate_limits(&self) {
        self.limiter.cleanup().await;
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(UserServiceError::ValidationError(
            "Username must be between 3 and 32 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
