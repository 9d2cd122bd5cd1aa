//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, rolling files)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log files / stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows into every access and recovery log line
//! - Log level follows config reloads

pub mod logging;
pub mod metrics;

pub use logging::{Logger, LoggingError};
