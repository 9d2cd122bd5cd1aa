//! The server between startup and shutdown.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::config::{AppConfig, ConfigWatcher, SharedConfig};
use crate::lifecycle::shutdown::{Shutdown, ShutdownError};
use crate::lifecycle::signals::{ShutdownTrigger, TerminationReason};
use crate::lifecycle::startup::{Collaborators, Started};
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::lifecycle::{LifecycleError, LogHandle, Resource};
use crate::net::{self, Drained};

/// How long aborted connection tasks get to wind down after a forced close.
const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A bound, serving instance and everything it owns.
pub struct RunningServer<C: Collaborators> {
    local_addr: SocketAddr,
    config: SharedConfig,
    lifecycle: Lifecycle,
    trigger: ShutdownTrigger,
    stop: Shutdown,
    force: Shutdown,
    serve_task: Option<JoinHandle<io::Result<Drained>>>,
    database: C::Database,
    cache: C::Cache,
    logger: Arc<C::Logger>,
    reload_task: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

enum Wake {
    Requested(TerminationReason),
    ServeEnded(Result<io::Result<Drained>, JoinError>),
}

impl<C: Collaborators> RunningServer<C> {
    /// Spawn the serve task and enter `Running`.
    pub(crate) fn launch(started: Started<C>, lifecycle: Lifecycle) -> Self {
        let Started {
            config,
            logger,
            database,
            cache,
            app,
            listener,
            local_addr,
            config_source,
        } = started;

        let stop = Shutdown::new();
        let force = Shutdown::new();
        let mut stop_rx = stop.subscribe();
        let mut force_rx = force.subscribe();

        let serve_task = tokio::spawn(net::serve(
            listener,
            app,
            async move {
                let _ = stop_rx.recv().await;
            },
            async move {
                let _ = force_rx.recv().await;
            },
        ));

        let logger = Arc::new(logger);
        let (watcher, reload_task) = match config_source {
            Some(path) => watch_config(&path, config.clone(), logger.clone()),
            None => (None, None),
        };

        lifecycle.transition(LifecycleState::Starting, LifecycleState::Running);
        tracing::info!(address = %local_addr, "HTTP server listening");

        Self {
            local_addr,
            config,
            lifecycle,
            trigger: ShutdownTrigger::new(),
            stop,
            force,
            serve_task: Some(serve_task),
            database,
            cache,
            logger,
            reload_task,
            watcher,
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// Handle that always yields the latest snapshot.
    pub fn shared_config(&self) -> SharedConfig {
        self.config.clone()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Cloneable handle for requesting termination (signal forwarder, tests).
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Drain window from the current configuration.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.config.load().server.shutdown_timeout_secs)
    }

    pub fn database(&self) -> &C::Database {
        &self.database
    }

    pub fn cache(&self) -> &C::Cache {
        &self.cache
    }

    pub fn logger(&self) -> &C::Logger {
        &self.logger
    }

    /// Suspend until termination is requested.
    ///
    /// Returns `Err` instead if the listener stops on its own first.
    pub async fn wait_for_termination(&mut self) -> Result<TerminationReason, LifecycleError> {
        let Some(serve_task) = self.serve_task.as_mut() else {
            return Err(LifecycleError::ListenerClosed);
        };

        let wake = tokio::select! {
            reason = self.trigger.wait() => Wake::Requested(reason),
            outcome = serve_task => Wake::ServeEnded(outcome),
        };

        match wake {
            Wake::Requested(reason) => {
                if self.lifecycle.begin_drain() {
                    tracing::info!(signal = %reason, "Shutdown server");
                }
                Ok(reason)
            }
            Wake::ServeEnded(outcome) => {
                self.serve_task = None;
                let err = match outcome {
                    Ok(Ok(_)) => LifecycleError::ListenerClosed,
                    Ok(Err(e)) => LifecycleError::Listener(e),
                    Err(e) => LifecycleError::ServeTask(e),
                };
                tracing::error!(error = %err, "HTTP server stopped unexpectedly");
                Err(err)
            }
        }
    }

    /// Stop accepting, drain for at most `max_wait`, then release resources.
    ///
    /// Connections still open when the window closes are aborted. A timeout is
    /// returned as an error but resources are closed regardless.
    pub async fn shutdown(mut self, max_wait: Duration) -> Result<(), ShutdownError> {
        self.lifecycle.begin_drain();
        let started = Instant::now();

        self.stop.trigger();
        tracing::info!(max_wait = ?max_wait, "Draining in-flight requests");

        let outcome = match self.serve_task.take() {
            None => Ok(()),
            Some(mut task) => {
                let joined = tokio::time::timeout(max_wait, &mut task).await;
                match joined {
                    Ok(Ok(Ok(_))) => Ok(()),
                    Ok(Ok(Err(e))) => Err(ShutdownError::Listener(e)),
                    Ok(Err(e)) => Err(ShutdownError::Task(e)),
                    Err(_) => {
                        self.force_close(task).await;
                        Err(ShutdownError::Timeout(max_wait))
                    }
                }
            }
        };

        if let Some(task) = self.reload_task.take() {
            task.abort();
        }
        drop(self.watcher.take());

        self.cache.close().await;
        self.database.close().await;
        self.lifecycle.stop();

        match &outcome {
            Ok(()) => tracing::info!(elapsed = ?started.elapsed(), "Server exiting"),
            Err(e) => tracing::warn!(error = %e, elapsed = ?started.elapsed(), "Server exiting after incomplete drain"),
        }
        outcome
    }

    /// Abort the connections still open and wait briefly for the serve task.
    async fn force_close(&self, mut task: JoinHandle<io::Result<Drained>>) {
        self.force.trigger();
        match tokio::time::timeout(FORCE_CLOSE_GRACE, &mut task).await {
            Ok(Ok(Ok(Drained::Forced(open)))) => {
                tracing::warn!(connections = open, "Closed connections still open after the drain window");
            }
            Ok(_) => {}
            Err(_) => {
                task.abort();
                tracing::error!("Serve task ignored the forced close, aborted");
            }
        }
    }
}

fn watch_config<L: LogHandle>(
    path: &Path,
    config: SharedConfig,
    logger: Arc<L>,
) -> (Option<RecommendedWatcher>, Option<JoinHandle<()>>) {
    match ConfigWatcher::new(path).spawn() {
        Ok((watcher, updates)) => {
            let task = tokio::spawn(apply_updates(updates, config, logger));
            (Some(watcher), Some(task))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            (None, None)
        }
    }
}

/// Publish each reloaded snapshot and re-apply the log level.
async fn apply_updates<L: LogHandle>(
    mut updates: mpsc::UnboundedReceiver<AppConfig>,
    config: SharedConfig,
    logger: Arc<L>,
) {
    while let Some(next) = updates.recv().await {
        let current = config.load_full();

        for setting in restart_only_changes(&current, &next) {
            tracing::warn!(setting, "Setting change takes effect after restart");
        }
        if current.log.level != next.log.level {
            if let Err(e) = logger.apply(&next.log) {
                tracing::warn!(error = %e, "Failed to apply log level");
            }
        }

        config.store(Arc::new(next));
        tracing::info!("Configuration reloaded");
    }
}

/// Changed settings that are only read at startup.
fn restart_only_changes(current: &AppConfig, next: &AppConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    let mut check = |setting: &'static str, differs: bool| {
        if differs {
            changed.push(setting);
        }
    };

    check("mode", current.mode != next.mode);
    check("port", current.port != next.port);
    check("server.host", current.server.host != next.server.host);
    check(
        "server.request_timeout_secs",
        current.server.request_timeout_secs != next.server.request_timeout_secs,
    );
    check("log.filename", current.log.filename != next.log.filename);
    check("log.rotation", current.log.rotation != next.log.rotation);
    check("log.max_backups", current.log.max_backups != next.log.max_backups);
    check("log.json", current.log.json != next.log.json);
    check("mysql", current.mysql != next.mysql);
    check("redis", current.redis != next.redis);
    check("metrics", current.metrics != next.metrics);

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, LogConfig};
    use crate::lifecycle::BoxError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogger {
        levels: Mutex<Vec<String>>,
    }

    impl LogHandle for RecordingLogger {
        fn apply(&self, config: &LogConfig) -> Result<(), BoxError> {
            self.levels.lock().unwrap().push(config.level.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn reload_swaps_snapshot_and_applies_log_level() {
        let shared = config::shared(AppConfig::default());
        let logger = Arc::new(RecordingLogger::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let before = shared.load_full();

        let mut next = AppConfig::default();
        next.log.level = "debug".into();
        next.server.shutdown_timeout_secs = 9;
        tx.send(next).unwrap();

        let mut same_log = AppConfig::default();
        same_log.log.level = "debug".into();
        tx.send(same_log).unwrap();
        drop(tx);

        apply_updates(rx, shared.clone(), logger.clone()).await;

        let after = shared.load_full();
        assert_eq!(before.server.shutdown_timeout_secs, 5);
        assert_eq!(after.log.level, "debug");
        assert_eq!(after.server.shutdown_timeout_secs, 5);
        assert_eq!(*logger.levels.lock().unwrap(), vec!["debug".to_string()]);
    }

    #[tokio::test]
    async fn log_file_change_keeps_level_and_needs_restart() {
        let shared = config::shared(AppConfig::default());
        let logger = Arc::new(RecordingLogger::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let mut next = AppConfig::default();
        next.log.filename = "logs/other.log".into();
        next.log.json = false;
        tx.send(next).unwrap();
        drop(tx);

        apply_updates(rx, shared.clone(), logger.clone()).await;

        assert!(logger.levels.lock().unwrap().is_empty());
        assert_eq!(shared.load().log.filename, "logs/other.log");
    }

    #[test]
    fn startup_only_settings_are_reported() {
        let current = AppConfig::default();
        assert!(restart_only_changes(&current, &current.clone()).is_empty());

        let mut next = current.clone();
        next.port = 9090;
        next.server.request_timeout_secs = 60;
        next.server.shutdown_timeout_secs = 10;
        next.log.level = "debug".into();
        next.log.rotation = crate::config::Rotation::Hourly;
        next.redis.db = 3;

        assert_eq!(
            restart_only_changes(&current, &next),
            vec!["port", "server.request_timeout_secs", "log.rotation", "redis"]
        );
    }
}
