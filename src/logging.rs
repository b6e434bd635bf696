//! File-based logging for spotify-session
//!
//! Logs go to a file rather than stdout so that the host app's own output,
//! and the login prompts of the bundled binary, stay readable.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "spotify-session";
const DEFAULT_FILTER: &str = "spotify_session=debug,rspotify=info,warn";

/// Initialize the logging system.
///
/// Logs are written to `.logs/spotify-session.YYYY-MM-DD.log` with daily rotation.
/// The log level can be controlled via the `RUST_LOG` environment variable.
///
/// Default log levels:
/// - `spotify_session` modules: DEBUG
/// - `rspotify`: INFO
/// - Other crates: WARN
///
/// The returned guard flushes pending lines when dropped; keep it alive for
/// the lifetime of the application.
pub fn init_logging() -> anyhow::Result<WorkerGuard> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE_PREFIX);

    // Non-blocking so log writes never stall the async runtime
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", LOG_DIR);

    Ok(guard)
}

/// Record how an SDK call ended: failures at warn, successes at debug.
#[macro_export]
macro_rules! log_sdk_result {
    ($call:expr, $result:expr) => {
        if let Err(e) = &$result {
            tracing::warn!(sdk_call = $call, error = %e, "SDK call failed");
        } else {
            tracing::debug!(sdk_call = $call, "SDK call succeeded");
        }
    };
}

/// Record the start of an SDK call together with the given fields.
#[macro_export]
macro_rules! log_sdk_call {
    ($call:expr $(, $($field:tt)+)?) => {
        tracing::debug!(sdk_call = $call, $($($field)+,)? "SDK call started")
    };
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::EnvFilter;

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(super::DEFAULT_FILTER);
        assert!(filter.is_ok());
    }

    #[test]
    fn test_sdk_macros_accept_results_and_fields() {
        let ok: Result<(), std::io::Error> = Ok(());
        let failed: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        crate::log_sdk_call!("me");
        crate::log_sdk_call!("refetch_token", attempt = 1);
        crate::log_sdk_result!("me", ok);
        crate::log_sdk_result!("me", failed);
    }
}
