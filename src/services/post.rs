//! Post service
//!
//! Blog post management: slugs, markdown rendering, publication state and
//! cache invalidation. Public pages only ever see published posts.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{PostRecord, PostRepository, UserRepository};
use crate::models::{CreatePostInput, ListParams, PagedResult, Post, PostStatus, UpdatePostInput};
use crate::services::markdown::{self, MarkdownRenderer, EXCERPT_CHARS};
use crate::services::page_cache;
use crate::services::slug::{generate_slug, is_valid_slug, unique_slug};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Single posts (1 hour)
const POST_CACHE_TTL_SECS: u64 = 3600;

/// Post lists refresh faster (10 minutes)
const POST_LIST_CACHE_TTL_SECS: u64 = 600;

const CACHE_KEY_POST_BY_ID: &str = "post:id:";
const CACHE_KEY_POST_BY_SLUG: &str = "post:slug:";
const CACHE_KEY_POST_LIST: &str = "posts:list:";

const MAX_TITLE_LEN: usize = 200;
const MAX_EXCERPT_LEN: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Author does not exist: {0}")]
    UnknownAuthor(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    cache: Arc<Cache>,
    renderer: MarkdownRenderer,
    cache_ttl: Duration,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        cache: Arc<Cache>,
        renderer: MarkdownRenderer,
    ) -> Self {
        Self {
            repo,
            users,
            cache,
            renderer,
            cache_ttl: Duration::from_secs(POST_CACHE_TTL_SECS),
        }
    }

    /// Create a post for `author_id`.
    ///
    /// An empty slug is generated from the title (with a numeric suffix when
    /// taken); an explicit slug must be well-formed and unused. A missing
    /// excerpt is derived from the body.
    pub async fn create(&self, author_id: i64, input: CreatePostInput) -> Result<Post, PostServiceError> {
        validate_title(&input.title)?;
        validate_body(&input.body)?;

        if self.users.get_by_id(author_id).await.context("Failed to look up author")?.is_none() {
            return Err(PostServiceError::UnknownAuthor(author_id));
        }

        let slug = self.resolve_slug(&input.slug, &input.title, None).await?;
        let excerpt = self.resolve_excerpt(input.excerpt.as_deref(), &input.body)?;
        let status = input.status.unwrap_or_default();

        let record = PostRecord {
            title: input.title.trim().to_string(),
            slug,
            excerpt,
            body_html: self.renderer.render(&input.body),
            body: input.body,
            author_id,
            status,
            published_at: (status == PostStatus::Published).then(Utc::now),
        };

        let post = self.repo.create(&record).await.context("Failed to create post")?;
        tracing::info!(post_id = post.id, slug = %post.slug, status = %post.status, "post created");

        self.invalidate_lists().await;
        Ok(post)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>, PostServiceError> {
        let cache_key = format!("{CACHE_KEY_POST_BY_ID}{id}");
        if let Ok(Some(post)) = self.cache.get::<Post>(&cache_key).await {
            return Ok(Some(post));
        }

        let post = self.repo.get_by_id(id).await.context("Failed to get post by ID")?;
        if let Some(ref p) = post {
            let _ = self.cache.set(&cache_key, p, self.cache_ttl).await;
        }
        Ok(post)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>, PostServiceError> {
        let cache_key = format!("{CACHE_KEY_POST_BY_SLUG}{slug}");
        if let Ok(Some(post)) = self.cache.get::<Post>(&cache_key).await {
            return Ok(Some(post));
        }

        let post = self.repo.get_by_slug(slug).await.context("Failed to get post by slug")?;
        if let Some(ref p) = post {
            let _ = self.cache.set(&cache_key, p, self.cache_ttl).await;
        }
        Ok(post)
    }

    /// Published post by slug; drafts and archived posts are invisible
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<Post>, PostServiceError> {
        Ok(self.get_by_slug(slug).await?.filter(Post::is_published))
    }

    /// All posts, any status, newest first
    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let posts = self
            .repo
            .list(params.offset(), params.limit())
            .await
            .context("Failed to list posts")?;
        let total = self.repo.count().await.context("Failed to count posts")?;
        Ok(PagedResult::new(posts, total, params))
    }

    pub async fn list_published(&self, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let cache_key = format!("{CACHE_KEY_POST_LIST}published:{}:{}", params.offset(), params.limit());
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Post>>(&cache_key).await {
            return Ok(cached);
        }

        let posts = self
            .repo
            .list_published(params.offset(), params.limit())
            .await
            .context("Failed to list published posts")?;
        let total = self
            .repo
            .count_published()
            .await
            .context("Failed to count published posts")?;

        let result = PagedResult::new(posts, total, params);
        let _ = self
            .cache
            .set(&cache_key, &result, Duration::from_secs(POST_LIST_CACHE_TTL_SECS))
            .await;
        Ok(result)
    }

    /// Render markdown the way post bodies are rendered, without storing it
    pub fn preview(&self, markdown: &str) -> String {
        self.renderer.render(markdown)
    }

    /// Latest published posts, for the home page
    pub async fn recent(&self, limit: u32) -> Result<Vec<Post>, PostServiceError> {
        Ok(self.list_published(&ListParams::new(1, limit)).await?.items)
    }

    pub async fn count(&self) -> Result<i64, PostServiceError> {
        Ok(self.repo.count().await.context("Failed to count posts")?)
    }

    pub async fn count_published(&self) -> Result<i64, PostServiceError> {
        Ok(self.repo.count_published().await.context("Failed to count published posts")?)
    }

    /// Apply a partial update. Publishing for the first time stamps
    /// `published_at`; later status changes never clear it.
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))?;

        if !input.has_changes() {
            return Ok(existing);
        }

        let title = match input.title {
            Some(title) => {
                validate_title(&title)?;
                title.trim().to_string()
            }
            None => existing.title.clone(),
        };

        let slug = match input.slug {
            Some(slug) if slug.trim() != existing.slug => {
                self.resolve_slug(&slug, &title, Some(id)).await?
            }
            _ => existing.slug.clone(),
        };

        let (body, body_html) = match input.body {
            Some(body) => {
                validate_body(&body)?;
                let html = self.renderer.render(&body);
                (body, html)
            }
            None => (existing.body.clone(), existing.body_html.clone()),
        };

        let excerpt = match input.excerpt {
            Some(excerpt) => self.resolve_excerpt(Some(&excerpt), &body)?,
            None => existing.excerpt.clone(),
        };

        let status = input.status.unwrap_or(existing.status);
        let published_at = match existing.published_at {
            Some(at) => Some(at),
            None if status == PostStatus::Published => Some(Utc::now()),
            None => None,
        };

        let record = PostRecord {
            title,
            slug,
            excerpt,
            body,
            body_html,
            author_id: existing.author_id,
            status,
            published_at,
        };

        let post = self.repo.update(id, &record).await.context("Failed to update post")?;
        self.invalidate_post(&existing).await;
        if existing.slug != post.slug {
            self.invalidate_post(&post).await;
        }
        self.invalidate_lists().await;
        Ok(post)
    }

    pub async fn publish(&self, id: i64) -> Result<Post, PostServiceError> {
        self.set_status(id, PostStatus::Published).await
    }

    /// Back to draft; `published_at` is kept
    pub async fn unpublish(&self, id: i64) -> Result<Post, PostServiceError> {
        self.set_status(id, PostStatus::Draft).await
    }

    async fn set_status(&self, id: i64, status: PostStatus) -> Result<Post, PostServiceError> {
        self.update(
            id,
            UpdatePostInput {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))?;

        self.repo.delete(id).await.context("Failed to delete post")?;
        tracing::info!(post_id = id, "post deleted");

        self.invalidate_post(&existing).await;
        self.invalidate_lists().await;
        Ok(())
    }

    async fn resolve_slug(
        &self,
        requested: &str,
        title: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, PostServiceError> {
        let requested = requested.trim();

        if requested.is_empty() {
            let base = generate_slug(title);
            let base = if base.is_empty() { "post".to_string() } else { base };
            let repo = &self.repo;
            return Ok(unique_slug(&base, |candidate| async move {
                repo.slug_exists(&candidate, exclude_id).await
            })
            .await?);
        }

        if !is_valid_slug(requested) {
            return Err(PostServiceError::ValidationError(
                "Slug may only contain lowercase letters, digits and single hyphens".to_string(),
            ));
        }
        if self
            .repo
            .slug_exists(requested, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(PostServiceError::DuplicateSlug(requested.to_string()));
        }
        Ok(requested.to_string())
    }

    fn resolve_excerpt(&self, requested: Option<&str>, body: &str) -> Result<String, PostServiceError> {
        match requested.map(str::trim).filter(|e| !e.is_empty()) {
            Some(excerpt) if excerpt.chars().count() > MAX_EXCERPT_LEN => Err(PostServiceError::ValidationError(
                format!("Excerpt must be at most {MAX_EXCERPT_LEN} characters"),
            )),
            Some(excerpt) => Ok(excerpt.to_string()),
            None => Ok(markdown::excerpt(body, EXCERPT_CHARS)),
        }
    }

    async fn invalidate_post(&self, post: &Post) {
        let _ = self.cache.delete(&format!("{CACHE_KEY_POST_BY_ID}{}", post.id)).await;
        let _ = self.cache.delete(&format!("{CACHE_KEY_POST_BY_SLUG}{}", post.slug)).await;
    }

    /// Drop cached lists and every rendered page
    async fn invalidate_lists(&self) {
        if let Err(e) = self.cache.delete_pattern(&format!("{CACHE_KEY_POST_LIST}*")).await {
            tracing::warn!("failed to invalidate post lists: {e}");
        }
        page_cache::invalidate_all(&self.cache).await;
    }
}

fn validate_title(title: &str) -> Result<(), PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_body(body: &str) -> Result<(), PostServiceError> {
    if body.trim().is_empty() {
        return Err(PostServiceError::ValidationError("Body cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxPostRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (PostService, Arc<Cache>, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let users = SqlxUserRepository::boxed(pool.clone());
        let author = users
            .create(&User {
                id: 0,
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "x".to_string(),
                role: UserRole::Admin,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let service = PostService::new(
            SqlxPostRepository::boxed(pool),
            users,
            cache.clone(),
            MarkdownRenderer::new(),
        );
        (service, cache, author.id)
    }

    fn input(title: &str, body: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug_excerpt_and_html() {
        let (svc, _, author) = setup().await;
        let post = svc.create(author, input("Hello, World!", "Some **bold** words.")).await.unwrap();

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.excerpt, "Some bold words.");
        assert!(post.body_html.contains("<strong>bold</strong>"));
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.published_at.is_none());
    }

    #[tokio::test]
    async fn test_generated_slugs_stay_unique() {
        let (svc, _, author) = setup().await;
        let a = svc.create(author, input("Same title", "a")).await.unwrap();
        let b = svc.create(author, input("Same title", "b")).await.unwrap();
        assert_eq!(a.slug, "same-title");
        assert_eq!(b.slug, "same-title-2");
    }

    #[tokio::test]
    async fn test_explicit_duplicate_slug_rejected() {
        let (svc, _, author) = setup().await;
        let mut first = input("One", "a");
        first.slug = "taken".to_string();
        svc.create(author, first.clone()).await.unwrap();

        let err = svc.create(author, first).await.unwrap_err();
        assert!(matches!(err, PostServiceError::DuplicateSlug(s) if s == "taken"));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let (svc, _, author) = setup().await;
        assert!(matches!(
            svc.create(author, input("  ", "body")).await,
            Err(PostServiceError::ValidationError(_))
        ));
        assert!(matches!(
            svc.create(author, input("Title", "")).await,
            Err(PostServiceError::ValidationError(_))
        ));
        let mut bad_slug = input("Title", "body");
        bad_slug.slug = "Not A Slug".to_string();
        assert!(matches!(
            svc.create(author, bad_slug).await,
            Err(PostServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_author_rejected() {
        let (svc, _, _) = setup().await;
        let err = svc.create(9999, input("Title", "body")).await.unwrap_err();
        assert!(matches!(err, PostServiceError::UnknownAuthor(9999)));
    }

    #[tokio::test]
    async fn test_publish_sets_published_at_once() {
        let (svc, _, author) = setup().await;
        let post = svc.create(author, input("Draft", "text")).await.unwrap();
        assert!(svc.get_published_by_slug("draft").await.unwrap().is_none());

        let published = svc.publish(post.id).await.unwrap();
        let first_stamp = published.published_at.expect("stamped on publish");
        assert!(svc.get_published_by_slug("draft").await.unwrap().is_some());

        let unpublished = svc.unpublish(post.id).await.unwrap();
        assert_eq!(unpublished.status, PostStatus::Draft);
        assert_eq!(unpublished.published_at, Some(first_stamp));

        let republished = svc.publish(post.id).await.unwrap();
        assert_eq!(republished.published_at, Some(first_stamp));
    }

    #[tokio::test]
    async fn test_public_listing_only_published() {
        let (svc, _, author) = setup().await;
        svc.create(author, input("Hidden", "x")).await.unwrap();
        let mut visible = input("Visible", "y");
        visible.status = Some(PostStatus::Published);
        svc.create(author, visible).await.unwrap();

        let page = svc.list_published(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].slug, "visible");
        assert_eq!(svc.list(&ListParams::default()).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_writes_invalidate_cached_lists_and_pages() {
        let (svc, cache, author) = setup().await;
        let mut first = input("First", "x");
        first.status = Some(PostStatus::Published);
        svc.create(author, first).await.unwrap();
        assert_eq!(svc.list_published(&ListParams::default()).await.unwrap().total, 1);

        cache.set("page:full:/blog/", &"<html>".to_string(), Duration::from_secs(60)).await.unwrap();

        let mut second = input("Second", "y");
        second.status = Some(PostStatus::Published);
        svc.create(author, second).await.unwrap();

        assert_eq!(svc.list_published(&ListParams::default()).await.unwrap().total, 2);
        assert_eq!(cache.get::<String>("page:full:/blog/").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_changes_slug_and_invalidates_old() {
        let (svc, _, author) = setup().await;
        let post = svc.create(author, input("Old", "x")).await.unwrap();
        assert!(svc.get_by_slug("old").await.unwrap().is_some());

        let updated = svc
            .update(
                post.id,
                UpdatePostInput {
                    slug: Some("new".to_string()),
                    body: Some("# Heading".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.slug, "new");
        assert!(updated.body_html.contains("<h1>"));
        assert!(svc.get_by_slug("old").await.unwrap().is_none());
        assert_eq!(svc.get_by_id(post.id).await.unwrap().unwrap().slug, "new");
    }

    #[tokio::test]
    async fn test_delete() {
        let (svc, _, author) = setup().await;
        let post = svc.create(author, input("Gone", "x")).await.unwrap();
        svc.get_by_id(post.id).await.unwrap();

        svc.delete(post.id).await.unwrap();
        assert!(svc.get_by_id(post.id).await.unwrap().is_none());
        assert!(matches!(svc.delete(post.id).await, Err(PostServiceError::NotFound(_))));
    }
}
