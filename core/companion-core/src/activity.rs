//! Activity labels and the pluggable activity source.
//!
//! The label is the one-line answer to "what is the assistant doing right
//! now?". Explicit operations set it directly; between operations the
//! tracker polls an `ActivitySource` while connected. The default source is
//! a randomized stand-in for a real event stream and can be swapped without
//! touching the tracker.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;

pub const IDLE: &str = "Idle";
pub const CONNECTED: &str = "Connected";
pub const NOT_RUNNING: &str = "Claude Code not running";
pub const DISCONNECTED: &str = "Disconnected";
pub const SESSION_STARTED: &str = "Session started";
pub const SESSION_ENDED: &str = "Session ended";

/// Labels the randomized source picks from.
pub const VOCABULARY: &[&str] = &[
    "Reading project files",
    "Writing code",
    "Running tests",
    "Analyzing codebase",
    IDLE,
];

pub fn switched_to(project: &str) -> String {
    format!("Switched to {}", project)
}

pub fn loaded_files(count: usize, project: &str) -> String {
    format!("Loaded {} from {}", files_noun(count), project)
}

pub fn adding_files(count: usize) -> String {
    format!("Adding {} to context", files_noun(count))
}

pub fn added_files(count: usize) -> String {
    format!("Added {} to context", files_noun(count))
}

pub fn using_tool(tool: &str) -> String {
    format!("Using tool: {}", tool)
}

pub fn reading(root: &Path, path: &str) -> String {
    format!("Reading: {}", relative_label(root, path))
}

pub fn writing(root: &Path, path: &str) -> String {
    format!("Writing: {}", relative_label(root, path))
}

fn files_noun(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", count)
    }
}

/// Path relative to `root`, or the raw path when it is outside the root or
/// would be empty.
pub fn relative_label(root: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(root)
        .ok()
        .map(|relative| relative.to_string_lossy().to_string())
        .filter(|relative| !relative.is_empty())
        .unwrap_or_else(|| path.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ActivityContext<'a> {
    pub now: DateTime<Utc>,
    pub current: &'a str,
    pub last_changed: DateTime<Utc>,
}

pub trait ActivitySource {
    /// Returns a new label, or None to leave the current one alone.
    fn sample(&mut self, ctx: &ActivityContext<'_>) -> Option<String>;
}

/// Changes the label once the current one has been up for a randomized
/// stretch within `[min_idle, max_idle]`.
#[derive(Debug)]
pub struct RandomizedActivity {
    rng: StdRng,
    min_idle: Duration,
    max_idle: Duration,
    threshold: Duration,
}

impl RandomizedActivity {
    pub fn new(min_idle: Duration, max_idle: Duration) -> Self {
        Self::with_rng(StdRng::from_entropy(), min_idle, max_idle)
    }

    pub fn with_seed(seed: u64, min_idle: Duration, max_idle: Duration) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), min_idle, max_idle)
    }

    fn with_rng(rng: StdRng, min_idle: Duration, max_idle: Duration) -> Self {
        let (min_idle, max_idle) = if max_idle < min_idle {
            (max_idle, min_idle)
        } else {
            (min_idle, max_idle)
        };
        let mut source = Self {
            rng,
            min_idle,
            max_idle,
            threshold: min_idle,
        };
        source.reroll();
        source
    }

    fn reroll(&mut self) {
        let min = self.min_idle.num_milliseconds();
        let max = self.max_idle.num_milliseconds();
        self.threshold = Duration::milliseconds(self.rng.gen_range(min..=max));
    }
}

impl ActivitySource for RandomizedActivity {
    fn sample(&mut self, ctx: &ActivityContext<'_>) -> Option<String> {
        if ctx.now.signed_duration_since(ctx.last_changed) < self.threshold {
            return None;
        }

        let candidates: Vec<&str> = VOCABULARY
            .iter()
            .copied()
            .filter(|label| *label != ctx.current)
            .collect();
        let next = candidates.choose(&mut self.rng)?.to_string();
        self.reroll();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn relative_label_strips_root() {
        let root = PathBuf::from("/repo");
        assert_eq!(relative_label(&root, "/repo/src/main.rs"), "src/main.rs");
        assert_eq!(relative_label(&root, "/elsewhere/x.rs"), "/elsewhere/x.rs");
        assert_eq!(relative_label(&root, "/repo"), "/repo");
    }

    #[test]
    fn counts_are_pluralized() {
        assert_eq!(adding_files(1), "Adding 1 file to context");
        assert_eq!(added_files(3), "Added 3 files to context");
        assert_eq!(loaded_files(2, "app"), "Loaded 2 files from app");
    }

    #[test]
    fn randomized_source_waits_for_threshold() {
        let min = Duration::seconds(3);
        let max = Duration::seconds(8);
        let mut source = RandomizedActivity::with_seed(7, min, max);
        let start = Utc::now();

        let early = ActivityContext {
            now: start + Duration::seconds(2),
            current: IDLE,
            last_changed: start,
        };
        assert_eq!(source.sample(&early), None);

        let late = ActivityContext {
            now: start + Duration::seconds(9),
            current: IDLE,
            last_changed: start,
        };
        let label = source.sample(&late).expect("label after max idle");
        assert_ne!(label, IDLE);
        assert!(VOCABULARY.contains(&label.as_str()));
    }

    #[test]
    fn randomized_source_never_repeats_current_label() {
        let mut source =
            RandomizedActivity::with_seed(42, Duration::zero(), Duration::zero());
        let now = Utc::now();
        for current in VOCABULARY {
            let ctx = ActivityContext {
                now,
                current,
                last_changed: now,
            };
            assert_ne!(source.sample(&ctx).as_deref(), Some(*current));
        }
    }
}
