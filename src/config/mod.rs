//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via SharedConfig to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the snapshot inside SharedConfig
//!     → readers see the new snapshot on their next load
//! ```
//!
//! # Design Decisions
//! - A snapshot is never mutated; reload publishes a new one
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, LogConfig, MetricsConfig, Mode, MysqlConfig, RedisConfig, Rotation, ServerConfig,
};
pub use watcher::ConfigWatcher;

/// Process-wide handle to the current configuration snapshot.
pub type SharedConfig = Arc<ArcSwap<AppConfig>>;

/// Wrap an initial snapshot for sharing.
pub fn shared(config: AppConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}
