//! Core types shared by the tracker, its ports and the host.
//!
//! All of these serialize with serde so the host can push them to a
//! presenter unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use companion_protocol::FileStatus;

// ═══════════════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════════════

/// A modeled assistant session rooted at a working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub cwd: String,
    /// Last path segment of `cwd`.
    pub project_name: String,
    pub started_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cwd: &Path,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cwd: cwd.to_string_lossy().to_string(),
            project_name: project_name_for(cwd),
            started_at,
            is_active: false,
        }
    }
}

/// Derives a project name from a directory: its last segment, or the whole
/// path for roots like `/`.
pub fn project_name_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Working set
// ═══════════════════════════════════════════════════════════════════════════════

/// A file in the assistant's current working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub path: String,
    pub name: String,
    pub status: FileStatus,
    pub last_accessed: DateTime<Utc>,
    /// True iff `status == Writing`.
    pub is_currently_editing: bool,
}

impl TrackedFile {
    pub fn new(path: &str, status: FileStatus, now: DateTime<Utc>) -> Self {
        Self {
            path: path.to_string(),
            name: display_name(path),
            status,
            last_accessed: now,
            is_currently_editing: status == FileStatus::Writing,
        }
    }

    pub fn touch(&mut self, status: FileStatus, now: DateTime<Utc>) {
        self.status = status;
        self.is_currently_editing = status == FileStatus::Writing;
        self.last_accessed = now;
    }
}

/// File name for display, falling back to the raw path when the path has no
/// final component (e.g. `/` or `..`).
pub fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| path.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Read model
// ═══════════════════════════════════════════════════════════════════════════════

/// Point-in-time snapshot returned by `Tracker::connection_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub session_id: Option<String>,
    pub activity: String,
    pub context_file_count: usize,
    pub active_files: Vec<TrackedFile>,
}
