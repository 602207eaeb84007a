//! Runtime configuration for the tracker and its probes.
//!
//! Read from `~/.companion/config.toml` (override with `COMPANION_CONFIG`).
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! ```toml
//! [tracker]
//! settle_delay_ms = 800
//! poll_interval_ms = 2000
//! auto_attach = true
//!
//! [probe]
//! env_var = "CLAUDECODE"
//! process_name = "claude"
//! socket_path = "/tmp/assistant.sock"
//! ```

use chrono::Duration;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{CompanionError, Result};
use crate::storage::StorageConfig;

pub const CONFIG_ENV: &str = "COMPANION_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub tracker: TrackerConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Pause between a session switch and its working-set load.
    pub settle_delay_ms: u64,
    /// How long a transient activity label stays before reverting to idle.
    pub activity_revert_ms: u64,
    /// How long a `Using tool: ...` label stays.
    pub tool_activity_ms: u64,
    pub polling: bool,
    pub poll_interval_ms: u64,
    pub poll_min_idle_ms: u64,
    pub poll_max_idle_ms: u64,
    /// Switch to the first discovered session when none is current.
    pub auto_attach: bool,
    pub working_set_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 800,
            activity_revert_ms: 2_000,
            tool_activity_ms: 3_000,
            polling: true,
            poll_interval_ms: 2_000,
            poll_min_idle_ms: 3_000,
            poll_max_idle_ms: 8_000,
            auto_attach: true,
            working_set_limit: 8,
        }
    }
}

impl TrackerConfig {
    pub fn settle_delay(&self) -> Duration {
        millis(self.settle_delay_ms)
    }

    pub fn activity_revert_delay(&self) -> Duration {
        millis(self.activity_revert_ms)
    }

    pub fn tool_activity_delay(&self) -> Duration {
        millis(self.tool_activity_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        millis(self.poll_interval_ms.max(1))
    }

    pub fn poll_min_idle(&self) -> Duration {
        millis(self.poll_min_idle_ms)
    }

    pub fn poll_max_idle(&self) -> Duration {
        millis(self.poll_max_idle_ms)
    }
}

/// Upper bound for any configured delay: one day.
pub const MAX_DELAY_MS: u64 = 86_400_000;

fn millis(value: u64) -> Duration {
    // MAX_DELAY_MS always fits in i64.
    Duration::milliseconds(value.min(MAX_DELAY_MS) as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub env_var: Option<String>,
    pub process_name: Option<String>,
    pub socket_path: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            env_var: Some("CLAUDECODE".to_string()),
            process_name: Some("claude".to_string()),
            socket_path: None,
        }
    }
}

/// Config path, honoring the `COMPANION_CONFIG` override.
pub fn config_path(storage: &StorageConfig) -> PathBuf {
    env::var(CONFIG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| storage.config_file())
}

/// Loads the config file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<CompanionConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(CompanionConfig::default())
        }
        Err(err) => {
            return Err(CompanionError::Io {
                context: format!("reading config {}", path.display()),
                source: err,
            })
        }
    };

    toml::from_str(&content).map_err(|err| CompanionError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Loads the config file, logging and falling back to defaults on failure.
pub fn load_config_or_default(path: &Path) -> CompanionConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load config; using defaults");
            CompanionConfig::default()
        }
    }
}
