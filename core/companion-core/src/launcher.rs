//! Spawning extra companion instances and choosing the initial directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};

use crate::error::{CompanionError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchResult {
    pub success: bool,
    pub message: String,
}

impl LaunchResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Starts detached `<program> run <dir>` processes.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Launcher that re-executes the running binary.
    pub fn current() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|err| CompanionError::LaunchFailed(format!("current executable: {}", err)))?;
        Ok(Self::new(program))
    }

    /// Never errors; failures come back as `success: false`.
    pub fn launch_instance(&self, directory: &str) -> LaunchResult {
        let dir = match validate_directory(directory) {
            Ok(dir) => dir,
            Err(err) => {
                warn!(directory, error = %err, "Refusing to launch instance");
                return LaunchResult::failed(err.to_string());
            }
        };

        match self.spawn(&dir) {
            Ok(pid) => {
                info!(pid, directory = %dir.display(), "Launched companion instance");
                LaunchResult {
                    success: true,
                    message: format!("Opened {}", dir.display()),
                }
            }
            Err(err) => {
                warn!(directory = %dir.display(), error = %err, "Failed to launch instance");
                LaunchResult::failed(err.to_string())
            }
        }
    }

    fn spawn(&self, dir: &Path) -> Result<u32> {
        let mut command = Command::new(&self.program);
        command
            .arg("run")
            .arg(dir)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|err| {
            CompanionError::LaunchFailed(format!("{}: {}", self.program.display(), err))
        })?;
        let pid = child.id();

        // The instance outlives this call; someone still has to reap it.
        let reaper = thread::Builder::new()
            .name("companion-reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) => debug!(pid, %status, "Launched instance exited"),
                Err(err) => warn!(pid, error = %err, "Failed to reap launched instance"),
            });
        if let Err(err) = reaper {
            warn!(pid, error = %err, "Could not start reaper thread");
        }
        Ok(pid)
    }
}

fn validate_directory(directory: &str) -> Result<PathBuf> {
    let trimmed = directory.trim();
    if trimmed.is_empty() {
        return Err(CompanionError::NotADirectory(PathBuf::new()));
    }
    let path = PathBuf::from(trimmed);
    if !path.is_dir() {
        return Err(CompanionError::NotADirectory(path));
    }
    path.canonicalize().map_err(|source| CompanionError::Io {
        context: format!("canonicalize {}", path.display()),
        source,
    })
}

/// Picks the tracker root from an optional command-line argument, falling
/// back to `cwd` when the argument is missing or not a directory.
pub fn resolve_initial_directory(arg: Option<&str>, cwd: &Path) -> PathBuf {
    let Some(arg) = arg.map(str::trim).filter(|arg| !arg.is_empty()) else {
        return cwd.to_path_buf();
    };

    let candidate = Path::new(arg);
    let candidate = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        cwd.join(candidate)
    };

    if candidate.is_dir() {
        candidate.canonicalize().unwrap_or(candidate)
    } else {
        warn!(directory = arg, "Not a directory; using current directory");
        cwd.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_falls_back_to_cwd() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cwd = dir.path();

        assert_eq!(resolve_initial_directory(None, cwd), cwd);
        assert_eq!(resolve_initial_directory(Some("  "), cwd), cwd);
        assert_eq!(resolve_initial_directory(Some("missing"), cwd), cwd);
    }

    #[test]
    fn test_resolve_accepts_relative_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let resolved = resolve_initial_directory(Some("sub"), dir.path());
        assert!(resolved.ends_with("sub"));
        assert!(resolved.is_dir());
    }

    #[test]
    fn test_launch_rejects_missing_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("gone");

        let result = Launcher::new("/bin/true").launch_instance(&missing.to_string_lossy());
        assert!(!result.success);
        assert!(result.message.contains("Not a directory"));
    }

    #[test]
    fn test_launch_reports_spawn_failure() {
        let dir = tempfile::tempdir().expect("temp dir");

        let result = Launcher::new("/definitely/not/a/binary")
            .launch_instance(&dir.path().to_string_lossy());
        assert!(!result.success);
        assert!(result.message.contains("Launch failed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_spawns_detached_process() {
        let dir = tempfile::tempdir().expect("temp dir");

        let result = Launcher::new("true").launch_instance(&dir.path().to_string_lossy());
        assert!(result.success, "{}", result.message);
        assert!(result.message.starts_with("Opened "));
    }

    /// Children of this process that have exited but were never waited on.
    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        std::fs::read_dir("/proc")
            .expect("read /proc")
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
            .filter(|stat| {
                // Fields after the parenthesized command name: state, ppid, ...
                let Some((_, rest)) = stat.rsplit_once(") ") else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_launched_instance_is_reaped() {
        let dir = tempfile::tempdir().expect("temp dir");

        let result = Launcher::new("true").launch_instance(&dir.path().to_string_lossy());
        assert!(result.success, "{}", result.message);

        // Give `true` time to exit, then allow the reaper a moment to wait on it.
        std::thread::sleep(std::time::Duration::from_millis(500));
        let mut zombies = zombie_children();
        for _ in 0..40 {
            if zombies == 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
            zombies = zombie_children();
        }
        assert_eq!(zombies, 0);
    }
}
