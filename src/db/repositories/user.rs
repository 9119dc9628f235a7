//! User repository
//!
//! - `UserRepository` trait defining user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

use super::LastInsertId;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user whose password is already hashed
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

macro_rules! user_from_row {
    ($row:expr) => {{
        let row = $row;
        let role: String = row.try_get("role")?;
        User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: UserRole::from_str(&role).unwrap_or_default(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_one(
        &self,
        label: &'static str,
        column: &'static str,
        value: &str,
    ) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        with_backend!(self.pool, label, |p| {
            match sqlx::query(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .with_context(|| format!("Failed to get user by {column}"))?
            {
                Some(row) => Ok(Some(user_from_row!(&row))),
                None => Ok(None),
            }
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let id = with_backend!(self.pool, "users.create", |p| {
            sqlx::query(
                "INSERT INTO users (username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create user")?
            .last_id()
        });

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        with_backend!(self.pool, "users.get_by_id", |p| {
            match sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?
            {
                Some(row) => Ok(Some(user_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.get_one("users.get_by_username", "username", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.get_one("users.get_by_email", "email", email).await
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let now = Utc::now();
        with_backend!(self.pool, "users.update_password", |p| {
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update password")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        with_backend!(self.pool, "users.count", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                .fetch_one(p)
                .await
                .context("Failed to count users")?;
            Ok(row.try_get("count")?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn user(name: &str) -> User {
        let now = Utc::now();
        User {
            id: 0,
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
            role: UserRole::Admin,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup().await;
        let created = repo.create(&user("ada")).await.unwrap();
        assert!(created.id > 0);

        let by_name = repo.get_by_username("ada").await.unwrap().expect("by username");
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.role, UserRole::Admin);

        let by_email = repo.get_by_email("ada@example.com").await.unwrap().expect("by email");
        assert_eq!(by_email.id, created.id);

        assert!(repo.get_by_id(created.id + 1).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_username_and_email_unique() {
        let repo = setup().await;
        repo.create(&user("ada")).await.unwrap();

        assert!(repo.create(&user("ada")).await.is_err());

        let mut same_email = user("grace");
        same_email.email = "ada@example.com".to_string();
        assert!(repo.create(&same_email).await.is_err());
    }

    #[tokio::test]
    async fn test_update_password() {
        let repo = setup().await;
        let created = repo.create(&user("ada")).await.unwrap();
        repo.update_password(created.id, "new-hash").await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.password_hash, "new-hash");
    }
}
