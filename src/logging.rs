use std::{env, fs, path::PathBuf};

use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{format::FmtSpan, time::UtcTime},
};

use crate::error::{FxPipeResult, IoError};

/// Installs the global JSON subscriber for a binary.
///
/// Inside a container (`CONTAINER` set or `/.dockerenv` present) logs go to
/// stdout. Otherwise they go to a fresh file under the user's state directory,
/// and the returned guard must be held until exit so buffered lines are flushed.
/// The level comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(app_name: &str) -> FxPipeResult<Option<WorkerGuard>> {
    let in_container = env::var("CONTAINER").is_ok() || PathBuf::from("/.dockerenv").exists();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NONE)
        .with_current_span(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_timer(UtcTime::rfc_3339());

    if in_container {
        builder
            .try_init()
            .map_err(|e| IoError::Logging(e.to_string()))?;
        tracing::info!("Logging to stdout (container mode)");
        return Ok(None);
    }

    let log_dir = log_dir(app_name)?;
    fs::create_dir_all(&log_dir).map_err(IoError::from)?;

    let timestamp = time::OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .map_err(|e| IoError::Logging(format!("Failed to format timestamp: {e}")))?;
    let file_name = format!("{app_name}-{timestamp}.log");

    let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    builder
        .with_writer(non_blocking)
        .try_init()
        .map_err(|e| IoError::Logging(e.to_string()))?;

    tracing::info!(log_file = %log_dir.join(&file_name).display(), "Logging to file (local mode)");
    Ok(Some(guard))
}

fn log_dir(app_name: &str) -> FxPipeResult<PathBuf> {
    if let Some(mut dir) = dirs::state_dir() {
        dir.push(app_name);
        dir.push("logs");
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(format!(".local/state/{app_name}/logs")))
        .ok_or_else(|| IoError::Logging("Failed to find home directory".to_string()).into())
}
