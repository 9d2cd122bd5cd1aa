//! Web service bootstrap library.
//!
//! Loads configuration, installs logging, connects MySQL and Redis, serves a
//! liveness route and shuts down gracefully on SIGINT/SIGTERM.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use lifecycle::{start, RunningServer, ShutdownTrigger, TerminationReason};
pub use service::Service;
