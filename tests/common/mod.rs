//! Shared collaborator doubles for lifecycle integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use service_bootstrap::config::{AppConfig, LogConfig, SharedConfig};
use service_bootstrap::http::routes;
use service_bootstrap::lifecycle::{BoxError, Collaborators, LogHandle, Resource, Stage};

/// Stand-in for the database or cache; records when it is closed.
pub struct FakeResource {
    name: &'static str,
    closed: Arc<Mutex<Vec<&'static str>>>,
}

impl Resource for FakeResource {
    async fn close(self) {
        self.closed.lock().unwrap().push(self.name);
    }
}

pub struct NoopLogger;

impl LogHandle for NoopLogger {
    fn apply(&self, _config: &LogConfig) -> Result<(), BoxError> {
        Ok(())
    }
}

/// In-process collaborators that can be told to fail at one stage.
pub struct Fakes {
    pub config: AppConfig,
    pub fail_at: Option<Stage>,
    pub attempted: Arc<Mutex<Vec<Stage>>>,
    pub closed: Arc<Mutex<Vec<&'static str>>>,
    pub routes: Router,
}

impl Fakes {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".into();
        config.port = 0;

        Self {
            config,
            fail_at: None,
            attempted: Arc::default(),
            closed: Arc::default(),
            routes: routes::router(),
        }
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::new()
        }
    }

    pub fn with_routes(self, routes: Router) -> Self {
        Self { routes, ..self }
    }

    fn step(&self, stage: Stage) -> Result<(), BoxError> {
        self.attempted.lock().unwrap().push(stage);
        if self.fail_at == Some(stage) {
            return Err(format!("{stage} unavailable").into());
        }
        Ok(())
    }

    fn resource(&self, name: &'static str) -> FakeResource {
        FakeResource {
            name,
            closed: self.closed.clone(),
        }
    }
}

impl Collaborators for Fakes {
    type Logger = NoopLogger;
    type Database = FakeResource;
    type Cache = FakeResource;

    fn load_config(&mut self) -> Result<AppConfig, BoxError> {
        self.step(Stage::Config)?;
        Ok(self.config.clone())
    }

    fn init_logger(&mut self, _config: &AppConfig) -> Result<NoopLogger, BoxError> {
        self.step(Stage::Logger)?;
        Ok(NoopLogger)
    }

    async fn connect_database(&mut self, _config: &AppConfig) -> Result<FakeResource, BoxError> {
        self.step(Stage::Database)?;
        Ok(self.resource("database"))
    }

    async fn connect_cache(&mut self, _config: &AppConfig) -> Result<FakeResource, BoxError> {
        self.step(Stage::Cache)?;
        Ok(self.resource("cache"))
    }

    fn build_router(&mut self, _config: &SharedConfig) -> Result<Router, BoxError> {
        self.step(Stage::Router)?;
        Ok(self.routes.clone())
    }
}

/// HTTP client that never reuses connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}
