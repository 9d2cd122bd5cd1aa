//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. All errors are collected, not just the first.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `mysql.max_conns`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "must not be empty"));
    }

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::new("server.host", "must not be empty"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.server.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.shutdown_timeout_secs",
            "must be greater than zero",
        ));
    }

    if LevelFilter::from_str(&config.log.level).is_err() {
        errors.push(ValidationError::new(
            "log.level",
            format!("unknown level '{}'", config.log.level),
        ));
    }

    if config.mysql.host.trim().is_empty() {
        errors.push(ValidationError::new("mysql.host", "must not be empty"));
    }
    if config.mysql.max_conns == 0 {
        errors.push(ValidationError::new("mysql.max_conns", "must be greater than zero"));
    }
    if config.mysql.max_idle_conns > config.mysql.max_conns {
        errors.push(ValidationError::new(
            "mysql.max_idle_conns",
            format!(
                "{} exceeds max_conns ({})",
                config.mysql.max_idle_conns, config.mysql.max_conns
            ),
        ));
    }
    if config.mysql.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "mysql.connect_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.redis.host.trim().is_empty() {
        errors.push(ValidationError::new("redis.host", "must not be empty"));
    }
    if config.redis.db < 0 {
        errors.push(ValidationError::new("redis.db", "must not be negative"));
    }
    if config.redis.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "redis.connect_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "metrics.address",
            format!("'{}' is not a socket address", config.metrics.address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
