//! URL slugs for posts and tools

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_SLUG_LEN: usize = 100;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap_or_else(|e| panic!("invalid slug regex: {e}"))
});

/// Derive a slug from a title: lowercase ASCII letters and digits separated
/// by single hyphens. Common Latin accents are folded; other characters act
/// as separators. May return an empty string.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c != '\'' {
            pending_hyphen = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Whether a user-supplied slug is acceptable as-is
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_SLUG_LEN && SLUG_RE.is_match(slug)
}

/// `base`, or `base-2`, `base-3`, ... : the first candidate for which
/// `taken` answers false
pub async fn unique_slug<F, Fut>(base: &str, mut taken: F) -> anyhow::Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    if !taken(base.to_string()).await? {
        return Ok(base.to_string());
    }
    for n in 2..1000 {
        let candidate = format!("{base}-{n}");
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    anyhow::bail!("no free slug for '{base}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum: a tour  "), "rust-axum-a-tour");
        assert_eq!(generate_slug("Don't panic"), "dont-panic");
        assert_eq!(generate_slug("Crème brûlée"), "creme-brulee");
        assert_eq!(generate_slug("snake_case_title"), "snake-case-title");
        assert_eq!(generate_slug("日本語"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("a"));
        assert!(is_valid_slug("my-post-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug("Upper"));
        assert!(!is_valid_slug(&"a".repeat(MAX_SLUG_LEN + 1)));
    }

    #[tokio::test]
    async fn test_unique_slug_appends_counter() {
        let existing = ["post", "post-2"];
        let slug = unique_slug("post", |s| async move { Ok(existing.contains(&s.as_str())) })
            .await
            .unwrap();
        assert_eq!(slug, "post-3");

        let free = unique_slug("fresh", |_| async { Ok(false) }).await.unwrap();
        assert_eq!(free, "fresh");
    }

    proptest! {
        #[test]
        fn prop_generated_slugs_are_valid_or_empty(title in ".{0,200}") {
            let slug = generate_slug(&title);
            prop_assert!(slug.is_empty() || is_valid_slug(&slug), "bad slug {:?}", slug);
        }
    }
}
