//! Logging system configuration and initialization
//!
//! Console output always; optional daily-rolled file output under the
//! configured log directory. The non-blocking writer guard is kept alive
//! for the process lifetime.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::infrastructure::config::LoggingConfig;

static LOG_GUARD: OnceCell<non_blocking::WorkerGuard> = OnceCell::new();

/// Initialize the logging system. Safe to call once per process; subsequent
/// calls fail because the global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));

    let console_layer = fmt::layer().with_target(true);

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("failed to create log directory {}", config.log_dir.display())
        })?;
        let appender = rolling::daily(&config.log_dir, "case-gallery-sync.log");
        let (writer, guard) = non_blocking(appender);
        let _ = LOG_GUARD.set(guard);

        Registry::default()
            .with(filter)
            .with(console_layer)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .context("logging already initialized")?;
        info!("📋 logging initialized (console + file in {})", config.log_dir.display());
    } else {
        Registry::default()
            .with(filter)
            .with(console_layer)
            .try_init()
            .context("logging already initialized")?;
        info!("📋 logging initialized (console only)");
    }

    Ok(())
}
