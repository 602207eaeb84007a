//! Window geometry persistence for the desktop shell.
//!
//! The shell reads this once at startup and writes it on move, resize and
//! close. Reads never fail: a missing, unreadable or corrupt file yields the
//! default 400×800 window with no saved position.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CompanionError, Result};

pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            x: None,
            y: None,
        }
    }
}

impl WindowState {
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %err, "Failed to read window state; using defaults");
                }
                return Self::default();
            }
        };

        match serde_json::from_str::<WindowState>(&content) {
            Ok(state) if state.width > 0 && state.height > 0 => state,
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Window state has zero size; using defaults");
                Self::default()
            }
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "Window state is corrupt; using defaults");
                Self::default()
            }
        }
    }

    /// Writes atomically via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CompanionError::Io {
                context: "creating window state dir".to_string(),
                source,
            })?;
        }

        let payload = serde_json::to_vec_pretty(self).map_err(|source| CompanionError::Json {
            context: "serializing window state".to_string(),
            source,
        })?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, payload).map_err(|source| CompanionError::Io {
            context: "writing window state".to_string(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| CompanionError::Io {
            context: "committing window state".to_string(),
            source,
        })?;
        Ok(())
    }
}
