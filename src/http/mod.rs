//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (axum::serve, spawned by the lifecycle)
//!     → request id
//!     → access log
//!     → panic recovery
//!     → timeout
//!     → routes.rs (GET / → "ok")
//! ```

pub mod middleware;
pub mod routes;
pub mod server;

pub use server::build_app;
