//! Post model
//!
//! Blog posts written in markdown, rendered to HTML on write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Words per minute used for the reading-time estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique among posts)
    pub slug: String,
    /// Short summary shown in listings
    pub excerpt: String,
    /// Markdown source
    pub body: String,
    /// Rendered HTML
    pub body_html: String,
    /// Author user ID
    pub author_id: i64,
    pub status: PostStatus,
    /// Set on first publish and never cleared
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Whether the post is visible on public pages
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Estimated reading time in minutes (at least one)
    pub fn reading_time_minutes(&self) -> usize {
        reading_time(&self.body)
    }
}

/// Reading time for a markdown body at [`WORDS_PER_MINUTE`], minimum 1 minute
pub fn reading_time(body: &str) -> usize {
    let words = body.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

/// Post publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Not visible to the public
    #[default]
    Draft,
    Published,
    /// Hidden but kept
    Archived,
}

impl PostStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    /// Parse the database string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "archived" => Some(PostStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    /// Generated from the title when empty
    #[serde(default)]
    pub slug: String,
    /// Derived from the body when absent
    #[serde(default)]
    pub excerpt: Option<String>,
    pub body: String,
    #[serde(default)]
    pub status: Option<PostStatus>,
}

/// Input for updating a post; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub status: Option<PostStatus>,
}

impl UpdatePostInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.slug.is_some()
            || self.excerpt.is_some()
            || self.body.is_some()
            || self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [PostStatus::Draft, PostStatus::Published, PostStatus::Archived] {
            assert_eq!(PostStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::parse("PUBLISHED"), Some(PostStatus::Published));
        assert_eq!(PostStatus::parse("deleted"), None);
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time("one two three"), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
        assert_eq!(reading_time(&"word ".repeat(1000)), 5);
    }

    #[test]
    fn test_update_has_changes() {
        assert!(!UpdatePostInput::default().has_changes());
        let input = UpdatePostInput {
            status: Some(PostStatus::Archived),
            ..Default::default()
        };
        assert!(input.has_changes());
    }
}
