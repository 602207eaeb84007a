//! Working-set loading after a session switch.
//!
//! There is no real handshake with the assistant, so the default loader
//! simulates one: it samples real files from the session's directory
//! (hidden entries and build output skipped), marks the first as being
//! written and the rest as being read, and falls back to a fabricated set
//! of common project files when the directory has nothing to offer.

use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::error::{CompanionError, Result};
use crate::types::{FileStatus, Session};

pub trait WorkingSetSource {
    fn load(&self, session: &Session) -> Result<Vec<(String, FileStatus)>>;
}

const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "vendor"];
const FALLBACK_FILES: &[&str] = &["README.md", "src/main.rs", "src/lib.rs", "Cargo.toml"];
const MAX_DEPTH: usize = 3;

#[derive(Debug, Clone)]
pub struct SimulatedWorkingSet {
    limit: usize,
}

impl SimulatedWorkingSet {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    fn sample(&self, root: &Path) -> Vec<String> {
        WalkDir::new(root)
            .max_depth(MAX_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .take(self.limit)
            .map(|entry| entry.path().to_string_lossy().to_string())
            .collect()
    }
}

impl Default for SimulatedWorkingSet {
    fn default() -> Self {
        Self::new(8)
    }
}

impl WorkingSetSource for SimulatedWorkingSet {
    fn load(&self, session: &Session) -> Result<Vec<(String, FileStatus)>> {
        let root = Path::new(&session.cwd);
        if !root.is_dir() {
            return Err(CompanionError::WorkingSetUnavailable {
                path: root.to_path_buf(),
                details: "session directory does not exist".to_string(),
            });
        }
        if self.limit == 0 {
            return Ok(Vec::new());
        }

        let mut paths = self.sample(root);
        if paths.is_empty() {
            paths = FALLBACK_FILES
                .iter()
                .take(self.limit)
                .map(|name| root.join(name).to_string_lossy().to_string())
                .collect();
        }

        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let status = if index == 0 {
                    FileStatus::Writing
                } else {
                    FileStatus::Reading
                };
                (path, status)
            })
            .collect())
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session_at(path: &Path) -> Session {
        Session::new("s-1", "test", path, Utc::now())
    }

    #[test]
    fn samples_real_files_and_skips_noise() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/app.rs"), "").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        std::fs::write(root.join(".git/HEAD"), "").unwrap();
        std::fs::write(root.join(".env"), "").unwrap();

        let files = SimulatedWorkingSet::new(10)
            .load(&session_at(root))
            .expect("load");

        assert_eq!(files.len(), 1);
        assert!(files[0].0.ends_with("app.rs"));
        assert_eq!(files[0].1, FileStatus::Writing);
    }

    #[test]
    fn respects_limit_and_marks_rest_reading() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["a.rs", "b.rs", "c.rs", "d.rs"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let files = SimulatedWorkingSet::new(3)
            .load(&session_at(dir.path()))
            .expect("load");

        assert_eq!(files.len(), 3);
        assert_eq!(files[0].1, FileStatus::Writing);
        assert!(files[1..].iter().all(|(_, s)| *s == FileStatus::Reading));
    }

    #[test]
    fn empty_directory_falls_back_to_fabricated_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let files = SimulatedWorkingSet::new(2)
            .load(&session_at(dir.path()))
            .expect("load");

        assert_eq!(files.len(), 2);
        assert!(files[0].0.ends_with("README.md"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("gone");
        assert!(SimulatedWorkingSet::default()
            .load(&session_at(&missing))
            .is_err());
    }
}
