//! Database layer
//!
//! This module provides database abstraction for the Folio site.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! Repository calls hold a [`QueryTimer`], which logs calls slower than
//! the configured `monitoring.slow_query_ms` threshold.
//!
//! # Usage
//!
//! ```ignore
//! use folio::config::DatabaseConfig;
//! use folio::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

const DEFAULT_SLOW_QUERY_MS: u64 = 100;

static SLOW_QUERY_MS: AtomicU64 = AtomicU64::new(DEFAULT_SLOW_QUERY_MS);
static SLOW_QUERY_COUNT: AtomicU64 = AtomicU64::new(0);

/// Set the threshold above which repository calls are logged as slow.
pub fn set_slow_query_threshold(ms: u64) {
    SLOW_QUERY_MS.store(ms, Ordering::Relaxed);
}

/// Current slow-query threshold in milliseconds.
pub fn slow_query_threshold() -> u64 {
    SLOW_QUERY_MS.load(Ordering::Relaxed)
}

/// Number of slow queries observed since startup.
pub fn slow_query_count() -> u64 {
    SLOW_QUERY_COUNT.load(Ordering::Relaxed)
}

/// Times a repository call and warns on drop when it exceeded the
/// slow-query threshold. Dropping on early return still records the call.
pub struct QueryTimer {
    label: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let threshold = slow_query_threshold();
        if elapsed_ms >= threshold {
            SLOW_QUERY_COUNT.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(query = self.label, elapsed_ms, threshold_ms = threshold, "slow query");
        }
    }
}
