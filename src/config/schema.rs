//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Service name, used in log output.
    pub name: String,

    /// Run mode (`dev` or `release`).
    pub mode: Mode,

    /// Service version string.
    pub version: String,

    /// Port the HTTP listener binds to (0 picks an ephemeral port).
    pub port: u16,

    /// Listener and drain settings.
    pub server: ServerConfig,

    /// Log output settings.
    pub log: LogConfig,

    /// MySQL connection settings.
    pub mysql: MysqlConfig,

    /// Redis connection settings.
    pub redis: RedisConfig,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Address the HTTP listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            mode: Mode::Dev,
            version: env!("CARGO_PKG_VERSION").to_string(),
            port: 8080,
            server: ServerConfig::default(),
            log: LogConfig::default(),
            mysql: MysqlConfig::default(),
            redis: RedisConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Run mode.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Logs are mirrored to stdout.
    #[default]
    Dev,
    /// Logs go to the log file only.
    Release,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host/interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum time to wait for in-flight requests on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Logging configuration.
///
/// Unknown keys are rejected: files roll over by time only, so size or age
/// limits such as `max_size` and `max_age` would otherwise be silently ignored.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,

    /// Log file path. Empty disables file output.
    pub filename: String,

    /// How often the log file rolls over.
    pub rotation: Rotation,

    /// Number of rolled files to keep (0 keeps all).
    pub max_backups: usize,

    /// Write JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filename: "logs/service.log".to_string(),
            rotation: Rotation::Daily,
            max_backups: 7,
            json: true,
        }
    }
}

/// MySQL connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,

    /// Upper bound on pooled connections.
    pub max_conns: u32,

    /// Connections the pool keeps open while idle.
    pub max_idle_conns: u32,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            dbname: "service".to_string(),
            max_conns: 200,
            max_idle_conns: 50,
            connect_timeout_secs: 5,
        }
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,

    /// Logical database index.
    pub db: i64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            connect_timeout_secs: 5,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}
