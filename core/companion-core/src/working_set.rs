//! The tracker's file working set.
//!
//! Files are indexed twice: by path to their `TrackedFile`, and as a plain
//! set of context paths. Both collections are private and every mutation
//! goes through this type, which keeps their key sets equal.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::types::{FileStatus, TrackedFile};

#[derive(Debug, Default, Clone)]
pub struct WorkingSet {
    files: HashMap<String, TrackedFile>,
    context: HashSet<String>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the path or refreshes its status and last-accessed time.
    pub fn upsert(&mut self, path: &str, status: FileStatus, now: DateTime<Utc>) {
        self.context.insert(path.to_string());
        self.files
            .entry(path.to_string())
            .and_modify(|file| file.touch(status, now))
            .or_insert_with(|| TrackedFile::new(path, status, now));
    }

    /// Returns false (and changes nothing) for an untracked path.
    pub fn update_status(&mut self, path: &str, status: FileStatus, now: DateTime<Utc>) -> bool {
        match self.files.get_mut(path) {
            Some(file) => {
                file.touch(status, now);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, path: &str) -> bool {
        let in_context = self.context.remove(path);
        let in_files = self.files.remove(path).is_some();
        in_context || in_files
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.context.clear();
    }

    pub fn len(&self) -> usize {
        self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.context.contains(path)
    }

    pub fn get(&self, path: &str) -> Option<&TrackedFile> {
        self.files.get(path)
    }

    /// Tracked files ordered by path.
    pub fn files(&self) -> Vec<TrackedFile> {
        let mut files: Vec<TrackedFile> = self.files.values().cloned().collect();
        files.sort_by(|left, right| left.path.cmp(&right.path));
        files
    }

    /// True when the file map and the context set hold the same keys.
    pub fn is_consistent(&self) -> bool {
        self.files.len() == self.context.len()
            && self.files.keys().all(|path| self.context.contains(path))
    }
}
