//! File logging for the host and its models

use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Environment variable that overrides the log filter
pub const LOG_ENV: &str = "MASTERKNX_LOG";

/// Environment variable that moves the log directory
pub const LOG_DIR_ENV: &str = "MASTERKNX_LOG_DIR";

const LOG_FILE: &str = "masterknx.log";

/// Host and presentation-model crates at info, dependencies at warn
const DEFAULT_FILTER: &str = "masterknx=info,knx_app=info,pmkit=info,pmkit_core=info,warn";

/// Install a daily rolling file subscriber.
///
/// Logs go to `$MASTERKNX_LOG_DIR`, or `<data dir>/masterknx/logs/`.
/// Lifecycle transitions are logged at `debug`, scope releases at `trace`.
///
/// ```bash
/// MASTERKNX_LOG=debug masterknx
/// MASTERKNX_LOG=pmkit=trace,masterknx=debug masterknx
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir).map_err(|e| {
        Error::host(format!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE);
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let filter = env_filter.to_string();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("masterknx host starting (pid {})", std::process::id());
    tracing::info!("Log file: {}", log_dir.join(LOG_FILE).display());
    tracing::info!("Filter: {}", filter);
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

fn get_log_directory() -> PathBuf {
    let base = std::env::var_os(LOG_DIR_ENV).map(PathBuf::from);
    resolve_log_directory(base.as_deref(), dirs::data_local_dir().as_deref())
}

fn resolve_log_directory(overridden: Option<&Path>, data_dir: Option<&Path>) -> PathBuf {
    match (overridden, data_dir) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(data)) => data.join("masterknx").join("logs"),
        (None, None) => PathBuf::from(".masterknx").join("logs"),
    }
}

/// Path of the file currently written to
pub fn get_current_log_file() -> PathBuf {
    get_log_directory().join(LOG_FILE)
}
