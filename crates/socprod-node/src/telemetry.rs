//! Telemetry and logging initialization.
//!
//! Sets up structured logging with tracing, pretty or JSON, to stdout or a
//! file.

use crate::config::LoggingConfig;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// The file writer flushes on drop, so its guard lives for the whole process.
static LOG_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(None);

/// Build the filter. `RUST_LOG` wins over the configured level.
fn filter(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Initialize logging from the node's logging section.
pub fn init_telemetry(config: &LoggingConfig) -> anyhow::Result<()> {
    match &config.log_file {
        Some(path) => init_telemetry_with_file(&config.level, config.json(), path),
        None => init_stdout(&config.level, config.json()),
    }
}

fn init_stdout(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = filter(level)?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

/// Initialize telemetry with file output.
pub fn init_telemetry_with_file(
    level: &str,
    json: bool,
    log_file: &std::path::Path,
) -> anyhow::Result<()> {
    let filter = filter(level)?;

    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init()?;
    }

    if let Ok(mut g) = LOG_GUARD.lock() {
        *g = Some(guard);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_rejected() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(filter("socprod=notalevel").is_err());
        }
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = LoggingConfig::default();
        // Only one global subscriber can be installed per process.
        let _ = init_telemetry(&config);
        assert!(init_telemetry(&config).is_err());
    }
}
