//! Error types for companion-core operations.
//!
//! Tracker operations never surface these to callers directly; they are
//! logged or converted into `error` notifications at the tracker boundary.

use std::path::PathBuf;

/// All errors that can occur in companion-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    // ─────────────────────────────────────────────────────────────────────
    // Connectivity Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Assistant not reachable: {0}")]
    NotReachable(String),

    #[error("Probe {probe} failed: {details}")]
    ProbeFailed { probe: String, details: String },

    #[error("Not connected to the assistant")]
    NotConnected,

    // ─────────────────────────────────────────────────────────────────────
    // Source Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Working set unavailable for {path}: {details}")]
    WorkingSetUnavailable { path: PathBuf, details: String },

    #[error("Assistant query failed: {0}")]
    QueryFailed(String),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found")]
    HomeNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Launch Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Launch failed: {0}")]
    LaunchFailed(String),
}

/// Convenience type alias for Results using CompanionError.
pub type Result<T> = std::result::Result<T, CompanionError>;

impl From<CompanionError> for String {
    fn from(err: CompanionError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_failed_display() {
        let err = CompanionError::ProbeFailed {
            probe: "env".to_string(),
            details: "CLAUDECODE not set".to_string(),
        };
        assert_eq!(err.to_string(), "Probe env failed: CLAUDECODE not set");
    }

    #[test]
    fn test_io_error_keeps_context() {
        let err = CompanionError::Io {
            context: "reading window state".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let message: String = err.into();
        assert!(message.contains("reading window state"));
        assert!(message.contains("gone"));
    }
}
