//! Sliding-window rate limiting
//!
//! [`SlidingWindowLimiter`] keeps a list of recent hit timestamps per key.
//! It backs the login limiter (per username and per IP), contact form
//! submissions and chat posting.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// At most `max_hits` within `window` per key
#[derive(Debug)]
pub struct SlidingWindowLimiter<K> {
    max_hits: usize,
    window: Duration,
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash + Clone> SlidingWindowLimiter<K> {
    pub fn new(max_hits: usize, window: Duration) -> Self {
        Self {
            max_hits,
            window,
            hits: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the key has used up its allowance
    pub async fn is_limited(&self, key: &K) -> bool {
        self.is_limited_at(key, Utc::now()).await
    }

    async fn is_limited_at(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        match hits.get_mut(key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.max_hits
            }
            None => false,
        }
    }

    pub async fn record(&self, key: K) {
        self.record_at(key, Utc::now()).await;
    }

    async fn record_at(&self, key: K, now: DateTime<Utc>) {
        let mut hits = self.hits.write().await;
        hits.entry(key).or_default().push(now);
    }

    /// Check and record in one step. Returns `false` when the hit is refused
    /// (refused hits are not recorded).
    pub async fn try_acquire(&self, key: K) -> bool {
        let now = Utc::now();
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        let times = hits.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= self.max_hits {
            return false;
        }
        times.push(now);
        true
    }

    pub async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    /// Drop expired hits and empty keys
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Login protection: 5 failed attempts per 15 minutes per username and
/// 10 requests per minute per IP address.
#[derive(Debug)]
pub struct LoginRateLimiter {
    usernames: SlidingWindowLimiter<String>,
    ips: SlidingWindowLimiter<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            usernames: SlidingWindowLimiter::new(5, Duration::minutes(15)),
            ips: SlidingWindowLimiter::new(10, Duration::minutes(1)),
        }
    }

    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames.is_limited(&username.to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase()).await;
    }

    /// Called on successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(&ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip).await;
    }

    pub async fn cleanup(&self) {
        self.usernames.cleanup().await;
        self.ips.cleanup().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
