//! Post repository
//!
//! - `PostRepository` trait defining post data access
//! - `SqlxPostRepository` implementing it for SQLite and MySQL

use crate::db::DynDatabasePool;
use crate::models::{Post, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

use super::LastInsertId;

const POST_COLUMNS: &str = "id, title, slug, excerpt, body, body_html, author_id, status, published_at, created_at, updated_at";

/// Fields written by create/update
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body: String,
    pub body_html: String,
    pub author_id: i64,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
}

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, record: &PostRecord) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// All posts, newest first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Post>>;

    async fn count(&self) -> Result<i64>;

    /// Published posts ordered by `published_at` descending
    async fn list_published(&self, offset: i64, limit: i64) -> Result<Vec<Post>>;

    async fn count_published(&self) -> Result<i64>;

    /// Overwrite every mutable column of the post
    async fn update(&self, id: i64, record: &PostRecord) -> Result<Post>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a slug is taken, optionally ignoring one post
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based post repository
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! post_from_row {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.try_get("status")?;
        Post {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            excerpt: row.try_get("excerpt")?,
            body: row.try_get("body")?,
            body_html: row.try_get("body_html")?,
            author_id: row.try_get("author_id")?,
            status: PostStatus::parse(&status).unwrap_or_default(),
            published_at: row.try_get("published_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, record: &PostRecord) -> Result<Post> {
        let now = Utc::now();
        let id = with_backend!(self.pool, "posts.create", |p| {
            sqlx::query(
                "INSERT INTO posts (title, slug, excerpt, body, body_html, author_id, status, published_at, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.title)
            .bind(&record.slug)
            .bind(&record.excerpt)
            .bind(&record.body)
            .bind(&record.body_html)
            .bind(record.author_id)
            .bind(record.status.as_str())
            .bind(record.published_at)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create post")?
            .last_id()
        });

        Ok(Post {
            id,
            title: record.title.clone(),
            slug: record.slug.clone(),
            excerpt: record.excerpt.clone(),
            body: record.body.clone(),
            body_html: record.body_html.clone(),
            author_id: record.author_id,
            status: record.status,
            published_at: record.published_at,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?");
        with_backend!(self.pool, "posts.get_by_id", |p| {
            match sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get post by ID")?
            {
                Some(row) => Ok(Some(post_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?");
        with_backend!(self.pool, "posts.get_by_slug", |p| {
            match sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get post by slug")?
            {
                Some(row) => Ok(Some(post_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        with_backend!(self.pool, "posts.list", |p| {
            let rows = sqlx::query(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list posts")?;
            let mut posts = Vec::with_capacity(rows.len());
            for row in &rows {
                posts.push(post_from_row!(row));
            }
            Ok(posts)
        })
    }

    async fn count(&self) -> Result<i64> {
        with_backend!(self.pool, "posts.count", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM posts")
                .fetch_one(p)
                .await
                .context("Failed to count posts")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn list_published(&self, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE status = 'published' \
             ORDER BY published_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        with_backend!(self.pool, "posts.list_published", |p| {
            let rows = sqlx::query(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list published posts")?;
            let mut posts = Vec::with_capacity(rows.len());
            for row in &rows {
                posts.push(post_from_row!(row));
            }
            Ok(posts)
        })
    }

    async fn count_published(&self) -> Result<i64> {
        with_backend!(self.pool, "posts.count_published", |p| {
            let row =
                sqlx::query("SELECT COUNT(*) AS count FROM posts WHERE status = 'published'")
                    .fetch_one(p)
                    .await
                    .context("Failed to count published posts")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn update(&self, id: i64, record: &PostRecord) -> Result<Post> {
        let now = Utc::now();
        with_backend!(self.pool, "posts.update", |p| {
            sqlx::query(
                "UPDATE posts SET title = ?, slug = ?, excerpt = ?, body = ?, body_html = ?, \
                 status = ?, published_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&record.title)
            .bind(&record.slug)
            .bind(&record.excerpt)
            .bind(&record.body)
            .bind(&record.body_html)
            .bind(record.status.as_str())
            .bind(record.published_at)
            .bind(now)
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update post")?;
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update: {}", id))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        with_backend!(self.pool, "posts.delete", |p| {
            let result = sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete post")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        with_backend!(self.pool, "posts.slug_exists", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM posts WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(-1))
                .fetch_one(p)
                .await
                .context("Failed to check post slug")?;
            let count: i64 = row.try_get("count")?;
            Ok(count > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxPostRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let sqlite = pool.as_sqlite().expect("sqlite pool");
        let author_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES ('author', 'author@example.com', 'x', 'admin')",
        )
        .execute(sqlite)
        .await
        .expect("Failed to create user")
        .last_insert_rowid();

        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo, author_id)
    }

    fn record(slug: &str, author_id: i64, status: PostStatus) -> PostRecord {
        PostRecord {
            title: format!("Title {slug}"),
            slug: slug.to_string(),
            excerpt: "excerpt".to_string(),
            body: "# Hello".to_string(),
            body_html: "<h1>Hello</h1>".to_string(),
            author_id,
            status,
            published_at: (status == PostStatus::Published).then(Utc::now),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let (_pool, repo, author) = setup().await;

        let post = repo.create(&record("hello", author, PostStatus::Draft)).await.unwrap();
        assert!(post.id > 0);

        let by_id = repo.get_by_id(post.id).await.unwrap().expect("post by id");
        assert_eq!(by_id.slug, "hello");
        assert_eq!(by_id.status, PostStatus::Draft);
        assert!(by_id.published_at.is_none());

        let by_slug = repo.get_by_slug("hello").await.unwrap().expect("post by slug");
        assert_eq!(by_slug.id, post.id);
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (_pool, repo, author) = setup().await;
        repo.create(&record("dup", author, PostStatus::Draft)).await.unwrap();
        assert!(repo.create(&record("dup", author, PostStatus::Draft)).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_author_rejected() {
        let (_pool, repo, author) = setup().await;
        assert!(repo
            .create(&record("orphan", author + 100, PostStatus::Draft))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_published_listing_excludes_drafts() {
        let (_pool, repo, author) = setup().await;
        repo.create(&record("a", author, PostStatus::Published)).await.unwrap();
        repo.create(&record("b", author, PostStatus::Draft)).await.unwrap();
        repo.create(&record("c", author, PostStatus::Archived)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.count_published().await.unwrap(), 1);

        let published = repo.list_published(0, 10).await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].slug, "a");

        assert_eq!(repo.list(0, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_slug_exists() {
        let (_pool, repo, author) = setup().await;
        let post = repo.create(&record("first", author, PostStatus::Draft)).await.unwrap();
        let other = repo.create(&record("second", author, PostStatus::Draft)).await.unwrap();

        assert!(repo.slug_exists("first", None).await.unwrap());
        assert!(!repo.slug_exists("first", Some(post.id)).await.unwrap());
        assert!(repo.slug_exists("first", Some(other.id)).await.unwrap());

        let mut changed = record("renamed", author, PostStatus::Published);
        changed.title = "Renamed".to_string();
        let updated = repo.update(post.id, &changed).await.unwrap();
        assert_eq!(updated.slug, "renamed");
        assert_eq!(updated.title, "Renamed");
        assert!(updated.published_at.is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_pool, repo, author) = setup().await;
        let post = repo.create(&record("gone", author, PostStatus::Draft)).await.unwrap();

        assert!(repo.delete(post.id).await.unwrap());
        assert!(!repo.delete(post.id).await.unwrap());
        assert!(repo.get_by_id(post.id).await.unwrap().is_none());
    }
}
