//! Storage collaborators.
//!
//! # Data Flow
//! ```text
//! [mysql] section → database.rs → sqlx MySQL pool  (verified with SELECT 1)
//! [redis] section → cache.rs    → redis ConnectionManager (verified with PING)
//! ```
//!
//! # Design Decisions
//! - Connection attempts are bounded by `connect_timeout_secs`
//! - A store that cannot be reached at startup is fatal; no retry loop
//! - Both stores close through the lifecycle `Resource` trait

pub mod cache;
pub mod database;

pub use cache::Cache;
pub use database::Database;

use std::time::Duration;

/// Error type for store connections.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("MySQL error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("invalid connection address: {0}")]
    Address(String),

    #[error("{store} connection timed out after {timeout:?}")]
    Timeout {
        store: &'static str,
        timeout: Duration,
    },
}
