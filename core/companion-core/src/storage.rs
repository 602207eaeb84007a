//! Storage configuration and path management for the companion.
//!
//! All on-disk locations are decided here:
//!
//! - `~/.companion/config.toml` - runtime configuration
//! - `~/.companion/logs/` - rolling log files
//! - `~/.file-explorer-window-state.json` - window geometry (fixed name, shared
//!   with the desktop shell)
//!
//! Tests use `StorageConfig::with_home(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

use crate::error::{CompanionError, Result};

pub const WINDOW_STATE_FILE: &str = ".file-explorer-window-state.json";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    home: PathBuf,
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves paths under the current user's home directory.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or(CompanionError::HomeNotFound)?;
        Ok(Self::with_home(home))
    }

    pub fn with_home(home: PathBuf) -> Self {
        let root = home.join(".companion");
        Self { home, root }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Root directory for companion data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn window_state_file(&self) -> PathBuf {
        self.home.join(WINDOW_STATE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_hang_off_home() {
        let storage = StorageConfig::with_home(PathBuf::from("/home/dev"));
        assert_eq!(storage.root(), Path::new("/home/dev/.companion"));
        assert_eq!(
            storage.config_file(),
            PathBuf::from("/home/dev/.companion/config.toml")
        );
        assert_eq!(storage.logs_dir(), PathBuf::from("/home/dev/.companion/logs"));
        assert_eq!(
            storage.window_state_file(),
            PathBuf::from("/home/dev/.file-explorer-window-state.json")
        );
    }
}
