//! Logging setup: stderr always, plus a daily-rolling file under
//! `~/.companion/logs/` when that directory is writable.
//!
//! stdout carries the line protocol, so nothing is ever logged there.

use fs_err as fs;
use std::env;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "COMPANION_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "companion.log";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init(logs_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match logs_dir.filter(|dir| fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }
    guard
}

fn env_filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", "0", "false", "no", "debug"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
