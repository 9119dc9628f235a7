//! Tool model
//!
//! Tools and projects shown on the showcase pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Showcased tool or project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique among tools)
    pub slug: String,
    /// Free-form grouping label, e.g. "cli" or "web"
    pub category: String,
    /// One-line summary for cards
    pub summary: String,
    /// Markdown description
    pub description: String,
    pub description_html: String,
    /// Live URL
    pub url: Option<String>,
    /// Source repository URL
    pub repo_url: Option<String>,
    /// Arbitrary JSON object (tech stack, status badges, ...)
    pub metadata: serde_json::Value,
    pub featured: bool,
    /// Ascending; ties broken by title
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateToolInput {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl Default for CreateToolInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            slug: String::new(),
            category: default_category(),
            summary: String::new(),
            description: String::new(),
            url: None,
            repo_url: None,
            metadata: empty_object(),
            featured: false,
            sort_order: 0,
        }
    }
}

fn default_category() -> String {
    "general".to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

/// Input for updating a tool; absent fields are left unchanged.
///
/// `url` and `repo_url` use a nested option: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateToolInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "double_option")]
    pub url: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub repo_url: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
    pub featured: Option<bool>,
    pub sort_order: Option<i32>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_defaults() {
        let input: CreateToolInput = serde_json::from_str(r#"{"title":"Probe"}"#).unwrap();
        assert_eq!(input.category, "general");
        assert!(input.metadata.is_object());
        assert!(!input.featured);
    }

    #[test]
    fn test_update_input_distinguishes_clear_from_absent() {
        let absent: UpdateToolInput = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(absent.url, None);

        let cleared: UpdateToolInput = serde_json::from_str(r#"{"url":null}"#).unwrap();
        assert_eq!(cleared.url, Some(None));

        let set: UpdateToolInput =
            serde_json::from_str(r#"{"url":"https://example.dev"}"#).unwrap();
        assert_eq!(set.url, Some(Some("https://example.dev".to_string())));
    }
}
