//! Shutdown coordination for the service.

use std::time::Duration;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks (the HTTP serve loop) subscribe and stop accepting
/// new work once `trigger` is called.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Ways a drain can end badly.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// In-flight requests were still running when the window closed.
    #[error("in-flight requests did not finish within {0:?}")]
    Timeout(Duration),

    /// The listener reported an error while draining.
    #[error("listener failed while draining: {0}")]
    Listener(#[source] std::io::Error),

    /// The serve task panicked or was cancelled.
    #[error("serve task ended abnormally: {0}")]
    Task(#[source] tokio::task::JoinError),
}

/// Whether the process should exit successfully after a run.
///
/// `fault` marks a listener failure or missing signal handlers. A drain that
/// ran out of time still counts as a normal exit.
pub fn exit_success(fault: bool, drained: &Result<(), ShutdownError>) -> bool {
    !fault && matches!(drained, Ok(()) | Err(ShutdownError::Timeout(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_timeout_still_exits_cleanly() {
        assert!(exit_success(false, &Ok(())));
        assert!(exit_success(
            false,
            &Err(ShutdownError::Timeout(Duration::from_secs(5)))
        ));
    }

    #[test]
    fn faults_exit_with_failure() {
        assert!(!exit_success(true, &Ok(())));
        assert!(!exit_success(
            true,
            &Err(ShutdownError::Timeout(Duration::from_secs(5)))
        ));

        let listener = std::io::Error::new(std::io::ErrorKind::Other, "accept failed");
        assert!(!exit_success(false, &Err(ShutdownError::Listener(listener))));
    }

    #[tokio::test]
    async fn subscribers_observe_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);

        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn dropping_coordinator_releases_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        drop(shutdown);
        assert!(rx.recv().await.is_err());
    }
}
