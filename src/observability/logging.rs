//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber from `[log]`
//! - Write rolling log files through a non-blocking worker
//! - Change the log level at runtime when the config is reloaded
//!
//! # Design Decisions
//! - JSON lines in files by default, plain text on the console
//! - `RUST_LOG`, when set, wins over the configured level for the whole run
//! - The worker guard lives inside `Logger`; dropping it flushes the file

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::{LogConfig, Mode, Rotation};
use crate::lifecycle::{BoxError, LogHandle};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error type for logger setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open log file: {0}")]
    Appender(#[from] rolling::InitError),

    #[error("failed to install subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to reload log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle to the installed subscriber.
pub struct Logger {
    filter: reload::Handle<EnvFilter, Registry>,
    env_override: Option<String>,
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Replace the active level filter.
    pub fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        self.filter.reload(build_filter(level)?)?;
        tracing::info!(level = %level, "Log level updated");
        Ok(())
    }
}

impl LogHandle for Logger {
    fn apply(&self, config: &LogConfig) -> Result<(), BoxError> {
        if let Some(directives) = &self.env_override {
            tracing::warn!(
                rust_log = %directives,
                level = %config.level,
                "RUST_LOG is set, configured log level not applied"
            );
            return Ok(());
        }
        Ok(self.set_level(&config.level)?)
    }
}

/// Install the global subscriber.
pub fn init(config: &LogConfig, mode: Mode) -> Result<Logger, LoggingError> {
    let env_override = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let directives = env_override.clone().unwrap_or_else(|| config.level.clone());
    let (filter, handle) = reload::Layer::new(build_filter(&directives)?);

    let (file_layer, guard) = match file_writer(config)? {
        Some((writer, guard)) => (Some(file_output_layer(writer, config.json)), Some(guard)),
        None => (None, None),
    };

    // Without a file there would be no output at all.
    let console_layer = (mode == Mode::Dev || file_layer.is_none())
        .then(|| fmt::layer().with_timer(ChronoLocal::new(TIME_FORMAT.to_string())));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(Logger {
        filter: handle,
        env_override,
        _guard: guard,
    })
}

/// Parse a filter string such as `info` or `service_bootstrap=debug,tower_http=warn`.
pub fn build_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|source| LoggingError::Filter {
        filter: directives.to_string(),
        source,
    })
}

fn file_output_layer<S>(writer: NonBlocking, json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Open the rolling appender described by `config`, if file output is enabled.
fn file_writer(config: &LogConfig) -> Result<Option<(NonBlocking, WorkerGuard)>, LoggingError> {
    if config.filename.trim().is_empty() {
        return Ok(None);
    }

    let path = Path::new(&config.filename);
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(directory)?;

    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("service");

    let mut builder = rolling::Builder::new()
        .rotation(rotation(config.rotation))
        .filename_prefix(prefix);
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        builder = builder.filename_suffix(ext);
    }
    if config.max_backups > 0 {
        builder = builder.max_log_files(config.max_backups);
    }

    let appender = builder.build(directory)?;
    Ok(Some(tracing_appender::non_blocking(appender)))
}

fn rotation(rotation: Rotation) -> rolling::Rotation {
    match rotation {
        Rotation::Minutely => rolling::Rotation::MINUTELY,
        Rotation::Hourly => rolling::Rotation::HOURLY,
        Rotation::Daily => rolling::Rotation::DAILY,
        Rotation::Never => rolling::Rotation::NEVER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn filter_accepts_levels_and_targets() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("info,service_bootstrap=trace,tower_http=warn").is_ok());
    }

    #[test]
    fn filter_rejects_bad_level() {
        let err = build_filter("service_bootstrap=shouting").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }

    #[test]
    fn empty_filename_disables_file_output() {
        let config = LogConfig {
            filename: String::new(),
            ..LogConfig::default()
        };
        assert!(file_writer(&config).unwrap().is_none());
    }

    #[test]
    fn file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/logs/app.log");
        let config = LogConfig {
            filename: target.to_string_lossy().into_owned(),
            rotation: Rotation::Never,
            ..LogConfig::default()
        };

        let writer = file_writer(&config).unwrap();
        assert!(writer.is_some());
        assert!(dir.path().join("nested/logs").is_dir());
    }

    fn test_logger(env_override: Option<&str>) -> (Logger, impl tracing::Subscriber) {
        let (layer, handle) =
            reload::Layer::<EnvFilter, Registry>::new(build_filter("info").unwrap());
        let subscriber = tracing_subscriber::registry().with(layer);
        let logger = Logger {
            filter: handle,
            env_override: env_override.map(str::to_string),
            _guard: None,
        };
        (logger, subscriber)
    }

    fn current_level(logger: &Logger) -> Option<LevelFilter> {
        logger.filter.with_current(|f| f.max_level_hint()).unwrap()
    }

    #[test]
    fn level_can_be_reloaded() {
        let (logger, _subscriber) = test_logger(None);

        logger.set_level("debug").unwrap();
        assert_eq!(current_level(&logger), Some(LevelFilter::DEBUG));

        let config = LogConfig {
            level: "warn".into(),
            ..LogConfig::default()
        };
        logger.apply(&config).unwrap();
        assert_eq!(current_level(&logger), Some(LevelFilter::WARN));
    }

    #[test]
    fn env_override_survives_reload() {
        let (logger, _subscriber) = test_logger(Some("trace"));

        let config = LogConfig {
            level: "error".into(),
            ..LogConfig::default()
        };
        logger.apply(&config).unwrap();
        assert_eq!(current_level(&logger), Some(LevelFilter::INFO));
    }
}
