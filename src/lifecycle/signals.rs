//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Translate them into a `TerminationReason`
//! - Forward them into the `ShutdownTrigger`
//!
//! SIGKILL cannot be caught and is not handled; it ends the process at once.
//! Repeated signals after the first are logged and ignored.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why the service was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// SIGINT (Ctrl+C).
    Interrupt,
    /// SIGTERM (the default of `kill`).
    Terminate,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Records the first termination request; later ones are no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<TerminationReason>>>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request termination. Returns `true` only for the first request.
    pub fn fire(&self, reason: TerminationReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    /// The first recorded request, if any.
    pub fn requested(&self) -> Option<TerminationReason> {
        *self.tx.borrow()
    }

    /// Wait until a termination request has been recorded.
    pub async fn wait(&self) -> TerminationReason {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return TerminationReason::Terminate;
            }
        }
    }
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Installed SIGINT/SIGTERM handlers.
pub struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Register the handlers. Must be called inside a tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next signal.
    pub async fn recv(&mut self) -> io::Result<TerminationReason> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => Ok(TerminationReason::Interrupt),
                _ = self.terminate.recv() => Ok(TerminationReason::Terminate),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok(TerminationReason::Interrupt)
        }
    }
}

/// Suspend until SIGINT or SIGTERM arrives.
pub async fn wait_for_termination() -> io::Result<TerminationReason> {
    TerminationSignals::install()?.recv().await
}

/// Forward every OS signal into `trigger` for the rest of the process.
pub fn spawn_forwarder(trigger: ShutdownTrigger) -> io::Result<JoinHandle<()>> {
    let mut signals = TerminationSignals::install()?;

    Ok(tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Ok(reason) => {
                    if trigger.fire(reason) {
                        tracing::info!(signal = %reason, "Shutdown signal received");
                    } else {
                        tracing::warn!(signal = %reason, "Already shutting down, signal ignored");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Signal handler failed");
                    break;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_wins() {
        let trigger = ShutdownTrigger::new();
        assert_eq!(trigger.requested(), None);

        assert!(trigger.fire(TerminationReason::Terminate));
        assert!(!trigger.fire(TerminationReason::Interrupt));
        assert!(!trigger.fire(TerminationReason::Terminate));

        assert_eq!(trigger.requested(), Some(TerminationReason::Terminate));
    }

    #[tokio::test]
    async fn wait_returns_after_fire() {
        let trigger = ShutdownTrigger::new();
        let remote = trigger.clone();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            remote.fire(TerminationReason::Interrupt);
        });

        assert_eq!(trigger.wait().await, TerminationReason::Interrupt);
    }

    #[tokio::test]
    async fn wait_sees_earlier_fire() {
        let trigger = ShutdownTrigger::new();
        trigger.fire(TerminationReason::Terminate);
        assert_eq!(trigger.wait().await, TerminationReason::Terminate);
    }

    #[test]
    fn reason_names() {
        assert_eq!(TerminationReason::Interrupt.to_string(), "SIGINT");
        assert_eq!(TerminationReason::Terminate.to_string(), "SIGTERM");
    }
}
