//! Production wiring of the lifecycle collaborators.

use std::path::PathBuf;

use axum::Router;

use crate::config::{load_config, AppConfig, SharedConfig};
use crate::http::routes;
use crate::lifecycle::{BoxError, Collaborators};
use crate::observability::logging::{self, Logger};
use crate::store::{Cache, Database};

/// Real config file, logger, MySQL, Redis and routes.
#[derive(Debug, Clone)]
pub struct Service {
    config_path: PathBuf,
}

impl Service {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

impl Collaborators for Service {
    type Logger = Logger;
    type Database = Database;
    type Cache = Cache;

    fn load_config(&mut self) -> Result<AppConfig, BoxError> {
        Ok(load_config(&self.config_path)?)
    }

    fn init_logger(&mut self, config: &AppConfig) -> Result<Logger, BoxError> {
        Ok(logging::init(&config.log, config.mode)?)
    }

    async fn connect_database(&mut self, config: &AppConfig) -> Result<Database, BoxError> {
        Ok(Database::connect(&config.mysql).await?)
    }

    async fn connect_cache(&mut self, config: &AppConfig) -> Result<Cache, BoxError> {
        Ok(Cache::connect(&config.redis).await?)
    }

    fn build_router(&mut self, _config: &SharedConfig) -> Result<Router, BoxError> {
        Ok(routes::router())
    }

    fn config_source(&self) -> Option<PathBuf> {
        Some(self.config_path.clone())
    }
}
