//! Logging Setup
//!
//! Console logging via tracing-subscriber with an env-filter; in debug mode
//! a daily-rolling file appender is added under the log directory.
//! `DISPERKIM_LOG_LEVEL` overrides the default filter.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logging configuration assembled in main before anything else runs.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    debug_mode: bool,
    log_dir: Option<PathBuf>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("disperkim-bot")
        .join("logs")
}

/// Initialize the global subscriber.
///
/// Returns the file appender's worker guard when file logging is active;
/// the caller must hold it for the lifetime of the process or buffered
/// lines are lost on exit.
pub fn init_logging(config: LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if config.debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("DISPERKIM_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = tracing_subscriber::fmt::layer().with_target(false);

    if config.debug_mode {
        let log_dir = config.log_dir.unwrap_or_else(default_log_dir);
        std::fs::create_dir_all(&log_dir)?;
        let appender = tracing_appender::rolling::daily(&log_dir, "disperkim-bot.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(file)
            .init();
        tracing::debug!("File logging enabled under {}", log_dir.display());
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        Ok(None)
    }
}
