//! Tool repository
//!
//! - `ToolRepository` trait defining tool data access
//! - `SqlxToolRepository` implementing it for SQLite and MySQL
//!
//! Listings are ordered by `sort_order` then title.

use crate::db::DynDatabasePool;
use crate::models::Tool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use super::LastInsertId;

const TOOL_COLUMNS: &str = "id, title, slug, category, summary, description, description_html, url, repo_url, metadata, featured, sort_order, created_at, updated_at";

/// Fields written by create/update
#[derive(Debug, Clone)]
pub struct ToolRecord {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub summary: String,
    pub description: String,
    pub description_html: String,
    pub url: Option<String>,
    pub repo_url: Option<String>,
    pub metadata: serde_json::Value,
    pub featured: bool,
    pub sort_order: i32,
}

impl From<&Tool> for ToolRecord {
    fn from(tool: &Tool) -> Self {
        Self {
            title: tool.title.clone(),
            slug: tool.slug.clone(),
            category: tool.category.clone(),
            summary: tool.summary.clone(),
            description: tool.description.clone(),
            description_html: tool.description_html.clone(),
            url: tool.url.clone(),
            repo_url: tool.repo_url.clone(),
            metadata: tool.metadata.clone(),
            featured: tool.featured,
            sort_order: tool.sort_order,
        }
    }
}

#[async_trait]
pub trait ToolRepository: Send + Sync {
    async fn create(&self, record: &ToolRecord) -> Result<Tool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tool>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tool>>;

    async fn list(&self) -> Result<Vec<Tool>>;

    async fn list_by_category(&self, category: &str) -> Result<Vec<Tool>>;

    async fn list_featured(&self, limit: i64) -> Result<Vec<Tool>>;

    /// Distinct categories in alphabetical order
    async fn categories(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<i64>;

    async fn update(&self, id: i64, record: &ToolRecord) -> Result<Tool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

macro_rules! tool_from_row {
    ($row:expr) => {{
        let row = $row;
        let metadata: String = row.try_get("metadata")?;
        Tool {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            category: row.try_get("category")?,
            summary: row.try_get("summary")?,
            description: row.try_get("description")?,
            description_html: row.try_get("description_html")?,
            url: row.try_get("url")?,
            repo_url: row.try_get("repo_url")?,
            metadata: serde_json::from_str(&metadata).unwrap_or_else(|_| serde_json::json!({})),
            featured: row.try_get("featured")?,
            sort_order: row.try_get("sort_order")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

pub struct SqlxToolRepository {
    pool: DynDatabasePool,
}

impl SqlxToolRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ToolRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_many(
        &self,
        label: &'static str,
        sql: &str,
        bind: Option<&str>,
    ) -> Result<Vec<Tool>> {
        with_backend!(self.pool, label, |p| {
            let mut query = sqlx::query(sql);
            if let Some(value) = bind {
                query = query.bind(value);
            }
            let rows = query.fetch_all(p).await.context("Failed to list tools")?;
            let mut tools = Vec::with_capacity(rows.len());
            for row in &rows {
                tools.push(tool_from_row!(row));
            }
            Ok(tools)
        })
    }
}


#[async_trait]
impl ToolRepository for SqlxToolRepository {
    async fn create(&self, record: &ToolRecord) -> Result<Tool> {
        let now = Utc::now();
        let metadata = serde_json::to_string(&record.metadata)?;
        let id = with_backend!(self.pool, "tools.create", |p| {
            sqlx::query(
                "INSERT INTO tools (title, slug, category, summary, description, description_html, url, repo_url, metadata, featured, sort_order, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.title)
            .bind(&record.slug)
            .bind(&record.category)
            .bind(&record.summary)
            .bind(&record.description)
            .bind(&record.description_html)
            .bind(record.url.as_deref())
            .bind(record.repo_url.as_deref())
            .bind(&metadata)
            .bind(record.featured)
            .bind(record.sort_order)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create tool")?
            .last_id()
        });

        Ok(Tool {
            id,
            title: record.title.clone(),
            slug: record.slug.clone(),
            category: record.category.clone(),
            summary: record.summary.clone(),
            description: record.description.clone(),
            description_html: record.description_html.clone(),
            url: record.url.clone(),
            repo_url: record.repo_url.clone(),
            metadata: record.metadata.clone(),
            featured: record.featured,
            sort_order: record.sort_order,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tool>> {
        let sql = format!("SELECT {TOOL_COLUMNS} FROM tools WHERE id = ?");
        with_backend!(self.pool, "tools.get_by_id", |p| {
            match sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get tool by ID")?
            {
                Some(row) => Ok(Some(tool_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tool>> {
        let sql = format!("SELECT {TOOL_COLUMNS} FROM tools WHERE slug = ?");
        with_backend!(self.pool, "tools.get_by_slug", |p| {
            match sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get tool by slug")?
            {
                Some(row) => Ok(Some(tool_from_row!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self) -> Result<Vec<Tool>> {
        let sql = format!("SELECT {TOOL_COLUMNS} FROM tools ORDER BY sort_order ASC, title ASC");
        self.fetch_many("tools.list", &sql, None).await
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Tool>> {
        let sql = format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE category = ? ORDER BY sort_order ASC, title ASC"
        );
        self.fetch_many("tools.list_by_category", &sql, Some(category)).await
    }

    async fn list_featured(&self, limit: i64) -> Result<Vec<Tool>> {
        let sql = format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE featured = ? ORDER BY sort_order ASC, title ASC LIMIT ?"
        );
        with_backend!(self.pool, "tools.list_featured", |p| {
            let rows = sqlx::query(&sql)
                .bind(true)
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list featured tools")?;
            let mut tools = Vec::with_capacity(rows.len());
            for row in &rows {
                tools.push(tool_from_row!(row));
            }
            Ok(tools)
        })
    }

    async fn categories(&self) -> Result<Vec<String>> {
        with_backend!(self.pool, "tools.categories", |p| {
            let rows = sqlx::query("SELECT DISTINCT category FROM tools ORDER BY category ASC")
                .fetch_all(p)
                .await
                .context("Failed to list tool categories")?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in &rows {
                categories.push(row.try_get::<String, _>("category")?);
            }
            Ok(categories)
        })
    }

    async fn count(&self) -> Result<i64> {
        with_backend!(self.pool, "tools.count", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM tools")
                .fetch_one(p)
                .await
                .context("Failed to count tools")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn update(&self, id: i64, record: &ToolRecord) -> Result<Tool> {
        let now = Utc::now();
        let metadata = serde_json::to_string(&record.metadata)?;
        with_backend!(self.pool, "tools.update", |p| {
            sqlx::query(
                "UPDATE tools SET title = ?, slug = ?, category = ?, summary = ?, description = ?, \
                 description_html = ?, url = ?, repo_url = ?, metadata = ?, featured = ?, sort_order = ?, \
                 updated_at = ? WHERE id = ?",
            )
            .bind(&record.title)
            .bind(&record.slug)
            .bind(&record.category)
            .bind(&record.summary)
            .bind(&record.description)
            .bind(&record.description_html)
            .bind(record.url.as_deref())
            .bind(record.repo_url.as_deref())
            .bind(&metadata)
            .bind(record.featured)
            .bind(record.sort_order)
            .bind(now)
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update tool")?;
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tool not found after update: {}", id))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        with_backend!(self.pool, "tools.delete", |p| {
            let result = sqlx::query("DELETE FROM tools WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete tool")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        with_backend!(self.pool, "tools.slug_exists", |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM tools WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(-1))
                .fetch_one(p)
                .await
                .context("Failed to check tool slug")?;
            let count: i64 = row.try_get("count")?;
            Ok(count > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxToolRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxToolRepository::new(pool)
    }

    fn record(title: &str, category: &str, sort_order: i32, featured: bool) -> ToolRecord {
        ToolRecord {
            title: title.to_string(),
            slug: title.to_lowercase(),
            category: category.to_string(),
            summary: String::new(),
            description: String::new(),
            description_html: String::new(),
            url: Some("https://example.dev".to_string()),
            repo_url: None,
            metadata: serde_json::json!({"stack": ["rust"]}),
            featured,
            sort_order,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup().await;
        let tool = repo.create(&record("Probe", "cli", 0, false)).await.unwrap();

        let fetched = repo.get_by_slug("probe").await.unwrap().expect("tool");
        assert_eq!(fetched.id, tool.id);
        assert_eq!(fetched.metadata["stack"][0], "rust");
        assert_eq!(fetched.url.as_deref(), Some("https://example.dev"));
        assert!(fetched.repo_url.is_none());
    }

    #[tokio::test]
    async fn test_ordering_and_filters() {
        let repo = setup().await;
        repo.create(&record("Zeta", "web", 0, true)).await.unwrap();
        repo.create(&record("Alpha", "web", 0, false)).await.unwrap();
        repo.create(&record("Mid", "cli", -1, true)).await.unwrap();

        let all: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(all, vec!["Mid", "Alpha", "Zeta"]);

        let web = repo.list_by_category("web").await.unwrap();
        assert_eq!(web.len(), 2);

        let featured = repo.list_featured(10).await.unwrap();
        assert_eq!(featured.len(), 2);
        assert_eq!(featured[0].title, "Mid");

        assert_eq!(repo.categories().await.unwrap(), vec!["cli", "web"]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_delete() {
        let repo = setup().await;
        let tool = repo.create(&record("Probe", "cli", 0, false)).await.unwrap();

        let mut changed = ToolRecord::from(&tool);
        changed.featured = true;
        changed.url = None;
        let updated = repo.update(tool.id, &changed).await.unwrap();
        assert!(updated.featured);
        assert!(updated.url.is_none());

        assert!(repo.slug_exists("probe", None).await.unwrap());
        assert!(!repo.slug_exists("probe", Some(tool.id)).await.unwrap());

        assert!(repo.delete(tool.id).await.unwrap());
        assert!(repo.get_by_id(tool.id).await.unwrap().is_none());
    }
}
