//! Translates wire-level assistant events into tracker events.
//!
//! ```text
//! SessionStart                      → SessionStart
//! Pre/PostToolUse + file, read tool  → FileRead
//! Pre/PostToolUse + file, write tool → FileWrite
//! Pre/PostToolUse otherwise          → ToolUse
//! SessionEnd                        → SessionEnd
//! Error                             → Error
//! ```

use companion_protocol::{EventEnvelope, EventType};
use std::path::{Path, PathBuf};

const READ_TOOLS: &[&str] = &["Read", "Glob", "Grep", "NotebookRead"];
const WRITE_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit", "NotebookEdit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    ToolUse { tool: String },
    FileRead { path: String },
    FileWrite { path: String },
    SessionStart { session_id: String, cwd: String },
    SessionEnd,
    Error { message: String },
}

impl AssistantEvent {
    /// Returns None for envelopes missing the fields their type needs;
    /// callers are expected to have run `EventEnvelope::validate` already.
    pub fn from_envelope(event: &EventEnvelope) -> Option<Self> {
        match event.event_type {
            EventType::SessionStart => Some(AssistantEvent::SessionStart {
                session_id: event.session_id.clone()?,
                cwd: event.cwd.clone()?,
            }),
            EventType::PreToolUse | EventType::PostToolUse => {
                let tool = event.tool.clone()?;
                let file_path = event
                    .file_path
                    .as_deref()
                    .and_then(|path| resolve_file_path(event.cwd.as_deref(), path));

                match file_path {
                    Some(path) if READ_TOOLS.contains(&tool.as_str()) => {
                        Some(AssistantEvent::FileRead { path })
                    }
                    Some(path) if WRITE_TOOLS.contains(&tool.as_str()) => {
                        Some(AssistantEvent::FileWrite { path })
                    }
                    _ => Some(AssistantEvent::ToolUse { tool }),
                }
            }
            EventType::SessionEnd => Some(AssistantEvent::SessionEnd),
            EventType::Error => Some(AssistantEvent::Error {
                message: event.message.clone()?,
            }),
        }
    }
}

fn resolve_file_path(cwd: Option<&str>, file_path: &str) -> Option<String> {
    if file_path.trim().is_empty() {
        return None;
    }
    let path = Path::new(file_path);
    if path.is_absolute() {
        return Some(file_path.to_string());
    }

    let combined = PathBuf::from(cwd?).join(file_path);
    combined.to_str().map(|value| value.to_string())
}
