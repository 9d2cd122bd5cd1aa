//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself: editors and
//! mounted config maps replace the file by rename, which drops a watch held on
//! the old inode. Bursts of events for one save are collapsed into one reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches one configuration file and emits validated snapshots.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Quiet period that ends a burst of file events.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// The returned watcher must be kept alive for snapshots to keep flowing;
    /// dropping it closes the receiver.
    pub fn spawn(
        self,
    ) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<AppConfig>), notify::Error> {
        let directory = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tokio::spawn(reload_loop(self.path.clone(), self.debounce, event_rx, update_tx));

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok((watcher, update_rx))
    }
}

/// Whether `event` changes the file called `file_name`.
fn touches(event: &Event, file_name: &OsString) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    );
    relevant
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    path: PathBuf,
    debounce: Duration,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<AppConfig>,
) {
    while events.recv().await.is_some() {
        // Wait for the burst to settle.
        while let Ok(Some(())) = tokio::time::timeout(debounce, events.recv()).await {}

        if !path.exists() {
            tracing::debug!(path = ?path, "Config file missing, waiting for it to reappear");
            continue;
        }

        tracing::info!(path = ?path, "Config file change detected, reloading");
        match load_config(&path) {
            Ok(config) => {
                if updates.send(config).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
