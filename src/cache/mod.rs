//! Cache layer
//!
//! - In-memory cache (moka), the default for single-instance deployment
//! - Redis cache behind the `redis-cache` feature
//!
//! ```rust,ignore
//! use folio::cache::{create_cache, CacheLayer};
//! use folio::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Cache layer trait
///
/// The generic methods make this trait non-object-safe; use the [`Cache`]
/// enum for runtime polymorphism.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Unified cache enum for runtime polymorphism
#[derive(Debug)]
pub enum Cache {
    Memory(MemoryCache),
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

impl Cache {
    /// Write, read back and delete a probe key. Used by the readiness check.
    pub async fn round_trip(&self) -> Result<()> {
        const PROBE_KEY: &str = "health:probe";
        let stamp = chrono::Utc::now().timestamp_millis();

        self.set(PROBE_KEY, &stamp, Duration::from_secs(5)).await?;
        let read: Option<i64> = self.get(PROBE_KEY).await?;
        self.delete(PROBE_KEY).await?;

        match read {
            Some(value) if value == stamp => Ok(()),
            _ => anyhow::bail!("cache probe value did not round-trip"),
        }
    }

    /// Name of the active backend, as reported by health checks
    pub fn driver_name(&self) -> &'static str {
        match self {
            Cache::Memory(_) => "memory",
            #[cfg(feature = "redis-cache")]
            Cache::Redis(_) => "redis",
        }
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_pattern(pattern).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete_pattern(pattern).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.clear().await,
        }
    }
}

/// Create a cache instance based on configuration
///
/// # Errors
/// - Redis is configured but the `redis-cache` feature is not enabled
/// - Redis is configured without a URL, or the connection fails
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);

    match config.driver {
        CacheDriver::Memory => Ok(Arc::new(Cache::Memory(MemoryCache::with_capacity_and_ttl(
            10_000, ttl,
        )))),
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using the Redis cache driver. \
                         Set 'redis_url' in the cache section or FOLIO_CACHE_REDIS_URL."
                    )
                })?;
                let cache = RedisCache::with_ttl(redis_url, ttl).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled. \
                     Rebuild with `--features redis-cache` or use the 'memory' driver."
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_cache() {
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        cache.set("k", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.driver_name(), "memory");
    }

    #[tokio::test]
    async fn test_round_trip_probe() {
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        cache.round_trip().await.expect("probe should succeed");
        assert_eq!(cache.get::<i64>("health:probe").await.unwrap(), None);
    }

    #[cfg(not(feature = "redis-cache"))]
    #[tokio::test]
    async fn test_redis_without_feature_fails() {
        let config = CacheConfig {
            driver: CacheDriver::Redis,
            redis_url: Some("redis://localhost:6379".to_string()),
            ttl_seconds: 3600,
        };
        let err = create_cache(&config).await.unwrap_err().to_string();
        assert!(err.contains("redis-cache"));
    }

    #[cfg(feature = "redis-cache")]
    #[tokio::test]
    async fn test_redis_without_url_fails() {
        let config = CacheConfig {
            driver: CacheDriver::Redis,
            redis_url: None,
            ttl_seconds: 3600,
        };
        let err = create_cache(&config).await.unwrap_err().to_string();
        assert!(err.contains("Redis URL"));
    }
}
