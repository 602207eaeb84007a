//! Session discovery.
//!
//! A `SessionSource` answers "which assistant sessions exist for this
//! root?". The default source synthesizes exactly one session rooted at the
//! tracker's directory, with an id that is stable for that path so repeated
//! discovery keeps the same session current.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::Result;
use crate::types::{project_name_for, Session};

pub trait SessionSource {
    /// Returns the full session list; the tracker replaces its collection
    /// with it wholesale.
    fn discover(&self, root: &Path, now: DateTime<Utc>) -> Result<Vec<Session>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSessionSource;

impl SessionSource for LocalSessionSource {
    fn discover(&self, root: &Path, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let session = Session::new(
            local_session_id(root),
            format!("{} (local)", project_name_for(root)),
            root,
            now,
        );
        Ok(vec![session])
    }
}

/// Stable id for the synthesized session at `root`.
pub fn local_session_id(root: &Path) -> String {
    format!(
        "local-{:x}",
        md5::compute(root.to_string_lossy().as_bytes())
    )
}
