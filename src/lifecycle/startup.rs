//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize collaborators in dependency order
//! - Report which stage failed
//! - Bind the listener and hand off to `RunningServer`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{self, AppConfig, SharedConfig};
use crate::http::server::build_app;
use crate::lifecycle::running::RunningServer;
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::lifecycle::{BoxError, LogHandle, Resource};

/// Startup stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Logger,
    Database,
    Cache,
    Router,
    Listener,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Config,
        Stage::Logger,
        Stage::Database,
        Stage::Cache,
        Stage::Router,
        Stage::Listener,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Logger => "logger",
            Stage::Database => "database",
            Stage::Cache => "cache",
            Stage::Router => "router",
            Stage::Listener => "listener",
        };
        f.write_str(name)
    }
}

/// A startup stage failed; nothing after it ran.
#[derive(Debug, thiserror::Error)]
#[error("init {stage} failed: {source}")]
pub struct StartupError {
    pub stage: Stage,
    #[source]
    pub source: BoxError,
}

impl StartupError {
    pub fn new(stage: Stage, source: impl Into<BoxError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// The subsystems the lifecycle brings up, in order.
pub trait Collaborators: Send {
    type Logger: LogHandle;
    type Database: Resource;
    type Cache: Resource;

    fn load_config(&mut self) -> Result<AppConfig, BoxError>;

    fn init_logger(&mut self, config: &AppConfig) -> Result<Self::Logger, BoxError>;

    fn connect_database(
        &mut self,
        config: &AppConfig,
    ) -> impl Future<Output = Result<Self::Database, BoxError>> + Send;

    fn connect_cache(
        &mut self,
        config: &AppConfig,
    ) -> impl Future<Output = Result<Self::Cache, BoxError>> + Send;

    /// Route table; middleware is added by the lifecycle.
    fn build_router(&mut self, config: &SharedConfig) -> Result<Router, BoxError>;

    /// File to watch for hot reload, if any.
    fn config_source(&self) -> Option<PathBuf> {
        None
    }
}

/// Everything `RunningServer` needs to take over.
pub(crate) struct Started<C: Collaborators> {
    pub config: SharedConfig,
    pub logger: C::Logger,
    pub database: C::Database,
    pub cache: C::Cache,
    pub app: Router,
    pub listener: TcpListener,
    pub local_addr: SocketAddr,
    pub config_source: Option<PathBuf>,
}

/// Bring the service up with a fresh lifecycle tracker.
pub async fn start<C: Collaborators>(collaborators: C) -> Result<RunningServer<C>, StartupError> {
    start_with(collaborators, Lifecycle::new()).await
}

/// Bring the service up, reporting transitions into `lifecycle`.
pub async fn start_with<C: Collaborators>(
    mut collaborators: C,
    lifecycle: Lifecycle,
) -> Result<RunningServer<C>, StartupError> {
    lifecycle.transition(LifecycleState::NotStarted, LifecycleState::Starting);

    match bring_up(&mut collaborators).await {
        Ok(started) => Ok(RunningServer::launch(started, lifecycle)),
        Err(e) => {
            lifecycle.stop();
            Err(e)
        }
    }
}

async fn bring_up<C: Collaborators>(collaborators: &mut C) -> Result<Started<C>, StartupError> {
    let config = collaborators
        .load_config()
        .map_err(|e| StartupError::new(Stage::Config, e))?;

    let logger = collaborators
        .init_logger(&config)
        .map_err(|e| StartupError::new(Stage::Logger, e))?;
    tracing::debug!(name = %config.name, version = %config.version, "Logger initialized");

    let database = collaborators
        .connect_database(&config)
        .await
        .map_err(|e| StartupError::new(Stage::Database, e))?;
    tracing::debug!("Database initialized");

    let cache = match collaborators.connect_cache(&config).await {
        Ok(cache) => cache,
        Err(e) => {
            database.close().await;
            return Err(StartupError::new(Stage::Cache, e));
        }
    };
    tracing::debug!("Cache initialized");

    let config = config::shared(config);
    match listen(collaborators, &config).await {
        Ok((app, listener, local_addr)) => Ok(Started {
            config_source: collaborators.config_source(),
            config,
            logger,
            database,
            cache,
            app,
            listener,
            local_addr,
        }),
        Err(e) => {
            cache.close().await;
            database.close().await;
            Err(e)
        }
    }
}

async fn listen<C: Collaborators>(
    collaborators: &mut C,
    config: &SharedConfig,
) -> Result<(Router, TcpListener, SocketAddr), StartupError> {
    let routes = collaborators
        .build_router(config)
        .map_err(|e| StartupError::new(Stage::Router, e))?;
    let snapshot = config.load_full();
    let app = build_app(routes, &snapshot);
    tracing::debug!("Router initialized");

    let listener = TcpListener::bind(snapshot.bind_address())
        .await
        .map_err(|e| StartupError::new(Stage::Listener, e))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| StartupError::new(Stage::Listener, e))?;

    Ok((app, listener, local_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        let names: Vec<_> = Stage::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["config", "logger", "database", "cache", "router", "listener"]
        );
    }

    #[test]
    fn error_names_stage() {
        let err = StartupError::new(Stage::Cache, "connection refused");
        assert_eq!(err.stage, Stage::Cache);
        assert_eq!(err.to_string(), "init cache failed: connection refused");
    }
}
