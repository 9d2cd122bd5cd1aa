//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Init logger → Connect database → Connect cache
//!     → Build router → Bind listener → spawn serve task
//!
//! Running (running.rs):
//!     wait_for_termination: first termination request, or listener fault
//!
//! Shutdown (shutdown.rs):
//!     Stop accepting → Drain in-flight requests (bounded)
//!     → Abort connections left at the deadline → Close stores
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ShutdownTrigger (first one wins)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: a failed stage stops everything after it
//! - Resources opened before a failure are closed before returning
//! - Drain has a fixed deadline; running past it is reported, not retried

pub mod running;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

use std::future::Future;

use crate::config::LogConfig;

pub use running::RunningServer;
pub use shutdown::{exit_success, Shutdown, ShutdownError};
pub use signals::{ShutdownTrigger, TerminationReason};
pub use startup::{start, start_with, Collaborators, Stage, StartupError};
pub use state::{Lifecycle, LifecycleState};

/// Boxed error used at collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Something opened at startup that must be released on shutdown.
pub trait Resource: Send + Sync + 'static {
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// The logger as seen by the lifecycle: kept alive, and told about reloads.
pub trait LogHandle: Send + Sync + 'static {
    fn apply(&self, config: &LogConfig) -> Result<(), BoxError>;
}

/// Faults observed while the server is running.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("listener failed: {0}")]
    Listener(#[source] std::io::Error),

    #[error("listener closed before shutdown was requested")]
    ListenerClosed,

    #[error("serve task ended abnormally: {0}")]
    ServeTask(#[source] tokio::task::JoinError),
}
