//! Rendered-page cache keys
//!
//! Full HTML of public GET pages is cached per path and effects mode by the
//! page cache middleware. Content writes drop every cached page.

use crate::cache::{Cache, CacheLayer};
use crate::effects::EffectsMode;

pub const PAGE_KEY_PREFIX: &str = "page:";

/// Cache key for a rendered page, e.g. `page:full:/blog/`
pub fn page_key(mode: EffectsMode, path_and_query: &str) -> String {
    format!("{PAGE_KEY_PREFIX}{}:{path_and_query}", mode.as_str())
}

pub async fn invalidate_all(cache: &Cache) {
    if let Err(e) = cache.delete_pattern(&format!("{PAGE_KEY_PREFIX}*")).await {
        tracing::warn!("failed to invalidate page cache: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::time::Duration;

    #[test]
    fn test_page_key() {
        assert_eq!(page_key(EffectsMode::Full, "/blog/"), "page:full:/blog/");
        assert_eq!(page_key(EffectsMode::Simplified, "/blog/?page=2"), "page:simplified:/blog/?page=2");
    }

    #[tokio::test]
    async fn test_invalidate_all_keeps_other_keys() {
        let cache = Cache::Memory(MemoryCache::new());
        let ttl = Duration::from_secs(60);
        cache.set(&page_key(EffectsMode::Full, "/"), &"a".to_string(), ttl).await.unwrap();
        cache.set(&page_key(EffectsMode::Off, "/tools/"), &"b".to_string(), ttl).await.unwrap();
        cache.set("post:id:1", &"c".to_string(), ttl).await.unwrap();

        invalidate_all(&cache).await;

        assert_eq!(cache.get::<String>("page:full:/").await.unwrap(), None);
        assert_eq!(cache.get::<String>("page:off:/tools/").await.unwrap(), None);
        assert_eq!(cache.get::<String>("post:id:1").await.unwrap().as_deref(), Some("c"));
    }
}
