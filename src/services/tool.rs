//! Tool service
//!
//! Showcase entries: slug uniqueness, markdown descriptions, category
//! listings and cache invalidation.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ToolRecord, ToolRepository};
use crate::models::{CreateToolInput, Tool, UpdateToolInput};
use crate::services::markdown::MarkdownRenderer;
use crate::services::page_cache;
use crate::services::slug::{generate_slug, is_valid_slug, unique_slug};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const TOOL_CACHE_TTL_SECS: u64 = 3600;
const TOOL_LIST_CACHE_TTL_SECS: u64 = 600;

const CACHE_KEY_TOOL_BY_SLUG: &str = "tool:slug:";
const CACHE_KEY_TOOL_LIST: &str = "tools:list:";

const MAX_TITLE_LEN: usize = 200;
const MAX_SUMMARY_LEN: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum ToolServiceError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tool slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ToolService {
    repo: Arc<dyn ToolRepository>,
    cache: Arc<Cache>,
    renderer: MarkdownRenderer,
}

impl ToolService {
    pub fn new(repo: Arc<dyn ToolRepository>, cache: Arc<Cache>, renderer: MarkdownRenderer) -> Self {
        Self { repo, cache, renderer }
    }

    pub async fn create(&self, input: CreateToolInput) -> Result<Tool, ToolServiceError> {
        validate_title(&input.title)?;
        let category = normalize_category(&input.category)?;
        validate_summary(&input.summary)?;
        let url = normalize_url("url", input.url)?;
        let repo_url = normalize_url("repo_url", input.repo_url)?;
        validate_metadata(&input.metadata)?;

        let slug = self.resolve_slug(&input.slug, &input.title, None).await?;

        let record = ToolRecord {
            title: input.title.trim().to_string(),
            slug,
            category,
            summary: input.summary.trim().to_string(),
            description_html: self.renderer.render(&input.description),
            description: input.description,
            url,
            repo_url,
            metadata: input.metadata,
            featured: input.featured,
            sort_order: input.sort_order,
        };

        let tool = self.repo.create(&record).await.context("Failed to create tool")?;
        tracing::info!(tool_id = tool.id, slug = %tool.slug, "tool created");

        self.invalidate_lists().await;
        Ok(tool)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Tool>, ToolServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get tool by ID")?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Tool>, ToolServiceError> {
        let cache_key = format!("{CACHE_KEY_TOOL_BY_SLUG}{slug}");
        if let Ok(Some(tool)) = self.cache.get::<Tool>(&cache_key).await {
            return Ok(Some(tool));
        }

        let tool = self.repo.get_by_slug(slug).await.context("Failed to get tool by slug")?;
        if let Some(ref t) = tool {
            let _ = self
                .cache
                .set(&cache_key, t, Duration::from_secs(TOOL_CACHE_TTL_SECS))
                .await;
        }
        Ok(tool)
    }

    pub async fn list(&self) -> Result<Vec<Tool>, ToolServiceError> {
        self.cached_list("all", || self.repo.list()).await
    }

    /// Tools in one category; an unknown category yields an empty list
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Tool>, ToolServiceError> {
        let category = generate_slug(category);
        self.cached_list(&format!("category:{category}"), || self.repo.list_by_category(&category))
            .await
    }

    pub async fn featured(&self, limit: i64) -> Result<Vec<Tool>, ToolServiceError> {
        let limit = limit.clamp(1, 50);
        self.cached_list(&format!("featured:{limit}"), || self.repo.list_featured(limit))
            .await
    }

    /// Distinct categories, alphabetical
    pub async fn categories(&self) -> Result<Vec<String>, ToolServiceError> {
        let key = format!("{CACHE_KEY_TOOL_LIST}categories");
        if let Ok(Some(cached)) = self.cache.get::<Vec<String>>(&key).await {
            return Ok(cached);
        }
        let categories = self.repo.categories().await.context("Failed to list categories")?;
        let _ = self
            .cache
            .set(&key, &categories, Duration::from_secs(TOOL_LIST_CACHE_TTL_SECS))
            .await;
        Ok(categories)
    }

    pub async fn count(&self) -> Result<i64, ToolServiceError> {
        Ok(self.repo.count().await.context("Failed to count tools")?)
    }

    async fn cached_list<F, Fut>(&self, name: &str, load: F) -> Result<Vec<Tool>, ToolServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Vec<Tool>>>,
    {
        let key = format!("{CACHE_KEY_TOOL_LIST}{name}");
        if let Ok(Some(cached)) = self.cache.get::<Vec<Tool>>(&key).await {
            return Ok(cached);
        }
        let tools = load().await.context("Failed to list tools")?;
        let _ = self
            .cache
            .set(&key, &tools, Duration::from_secs(TOOL_LIST_CACHE_TTL_SECS))
            .await;
        Ok(tools)
    }

    pub async fn update(&self, id: i64, input: UpdateToolInput) -> Result<Tool, ToolServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get tool")?
            .ok_or_else(|| ToolServiceError::NotFound(id.to_string()))?;

        let mut record = ToolRecord::from(&existing);

        if let Some(title) = input.title {
            validate_title(&title)?;
            record.title = title.trim().to_string();
        }
        if let Some(slug) = input.slug {
            if slug.trim() != existing.slug {
                record.slug = self.resolve_slug(&slug, &record.title, Some(id)).await?;
            }
        }
        if let Some(category) = input.category {
            record.category = normalize_category(&category)?;
        }
        if let Some(summary) = input.summary {
            validate_summary(&summary)?;
            record.summary = summary.trim().to_string();
        }
        if let Some(description) = input.description {
            record.description_html = self.renderer.render(&description);
            record.description = description;
        }
        if let Some(url) = input.url {
            record.url = normalize_url("url", url)?;
        }
        if let Some(repo_url) = input.repo_url {
            record.repo_url = normalize_url("repo_url", repo_url)?;
        }
        if let Some(metadata) = input.metadata {
            validate_metadata(&metadata)?;
            record.metadata = metadata;
        }
        if let Some(featured) = input.featured {
            record.featured = featured;
        }
        if let Some(sort_order) = input.sort_order {
            record.sort_order = sort_order;
        }

        let tool = self.repo.update(id, &record).await.context("Failed to update tool")?;

        let _ = self.cache.delete(&format!("{CACHE_KEY_TOOL_BY_SLUG}{}", existing.slug)).await;
        self.invalidate_lists().await;
        Ok(tool)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ToolServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get tool")?
            .ok_or_else(|| ToolServiceError::NotFound(id.to_string()))?;

        self.repo.delete(id).await.context("Failed to delete tool")?;
        tracing::info!(tool_id = id, "tool deleted");

        let _ = self.cache.delete(&format!("{CACHE_KEY_TOOL_BY_SLUG}{}", existing.slug)).await;
        self.invalidate_lists().await;
        Ok(())
    }

    async fn resolve_slug(
        &self,
        requested: &str,
        title: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, ToolServiceError> {
        let requested = requested.trim();

        if requested.is_empty() {
            let base = generate_slug(title);
            let base = if base.is_empty() { "tool".to_string() } else { base };
            let repo = &self.repo;
            return Ok(unique_slug(&base, |candidate| async move {
                repo.slug_exists(&candidate, exclude_id).await
            })
            .await?);
        }

        if !is_valid_slug(requested) {
            return Err(ToolServiceError::ValidationError(
                "Slug may only contain lowercase letters, digits and single hyphens".to_string(),
            ));
        }
        if self
            .repo
            .slug_exists(requested, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(ToolServiceError::DuplicateSlug(requested.to_string()));
        }
        Ok(requested.to_string())
    }

    async fn invalidate_lists(&self) {
        if let Err(e) = self.cache.delete_pattern(&format!("{CACHE_KEY_TOOL_LIST}*")).await {
            tracing::warn!("failed to invalidate tool lists: {e}");
        }
        page_cache::invalidate_all(&self.cache).await;
    }
}

fn validate_title(title: &str) -> Result<(), ToolServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ToolServiceError::ValidationError("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ToolServiceError::ValidationError(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_summary(summary: &str) -> Result<(), ToolServiceError> {
    if summary.trim().chars().count() > MAX_SUMMARY_LEN {
        return Err(ToolServiceError::ValidationError(format!(
            "Summary must be at most {MAX_SUMMARY_LEN} characters"
        )));
    }
    Ok(())
}

/// Categories are slug-shaped; "CLI Tools" becomes "cli-tools"
fn normalize_category(category: &str) -> Result<String, ToolServiceError> {
    let normalized = generate_slug(category);
    if normalized.is_empty() {
        return Err(ToolServiceError::ValidationError("Category cannot be empty".to_string()));
    }
    Ok(normalized)
}

/// Empty strings clear the link; anything else must be http(s)
fn normalize_url(field: &str, url: Option<String>) -> Result<Option<String>, ToolServiceError> {
    match url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        None => Ok(None),
        Some(u) if (u.starts_with("https://") || u.starts_with("http://")) && !u.contains(char::is_whitespace) => {
            Ok(Some(u))
        }
        Some(_) => Err(ToolServiceError::ValidationError(format!(
            "{field} must be an http(s) URL"
        ))),
    }
}

fn validate_metadata(metadata: &serde_json::Value) -> Result<(), ToolServiceError> {
    if !metadata.is_object() {
        return Err(ToolServiceError::ValidationError("metadata must be a JSON object".to_string()));
    }
    Ok(())
}
