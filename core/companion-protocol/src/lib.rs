//! Line protocol types and validation for the companion host.
//!
//! Shared by the host binary and any presenter that drives it, so both sides
//! agree on one schema. The host remains the authority on validation, but
//! clients can reuse the same types to construct valid requests.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    Initialize,
    DiscoverSessions,
    SwitchSession,
    AddFiles,
    RemoveFile,
    UpdateFileStatus,
    StartSession,
    EndSession,
    Disconnect,
    GetStatus,
    SendMessage,
    Event,
    OpenWindow,
    SaveWindowState,
    GetWindowState,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// Unsolicited line pushed to the presenter whenever tracker state changes.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub notification: String,
    pub data: Value,
}

impl Notification {
    pub fn new(notification: impl Into<String>, data: Value) -> Self {
        Self {
            notification: notification.into(),
            data,
        }
    }
}

/// Parses a request line, enforcing size and version limits.
pub fn parse_request(line: &str) -> Result<Request, ErrorInfo> {
    if line.len() > MAX_REQUEST_BYTES {
        return Err(ErrorInfo::new(
            "request_too_large",
            "request exceeded maximum size",
        ));
    }
    if line.trim().is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let request: Request = serde_json::from_str(line).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("request is invalid JSON: {}", err))
    })?;

    if request.protocol_version != PROTOCOL_VERSION {
        return Err(ErrorInfo::new(
            "protocol_mismatch",
            format!(
                "unsupported protocol_version {} (expected {})",
                request.protocol_version, PROTOCOL_VERSION
            ),
        ));
    }

    Ok(request)
}

/// Deserializes typed params, treating a missing object as an error.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new("missing_params", "params are required"))?;
    serde_json::from_value(params)
        .map_err(|err| ErrorInfo::new("invalid_params", format!("params are invalid: {}", err)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Working-set status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Reading,
    Writing,
    Added,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Reading => write!(f, "reading"),
            FileStatus::Writing => write!(f, "writing"),
            FileStatus::Added => write!(f, "added"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Method params
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchSessionParams {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddFilesParams {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveFileParams {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFileStatusParams {
    pub path: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageParams {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenWindowParams {
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowStateParams {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Assistant events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum EventType {
    SessionStart,
    PreToolUse,
    PostToolUse,
    SessionEnd,
    Error,
}

/// What the assistant process reports it just did.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    pub event_id: String,
    pub recorded_at: String,
    pub event_type: EventType,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl EventEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.event_id.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_event_id", "event_id is required"));
        }
        if self.event_id.len() > 128 {
            return Err(ErrorInfo::new(
                "invalid_event_id",
                "event_id must be 128 characters or fewer",
            ));
        }

        if DateTime::parse_from_rfc3339(&self.recorded_at).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "recorded_at must be RFC3339",
            ));
        }

        match self.event_type {
            EventType::SessionStart => {
                require_string(&self.session_id, "session_id")?;
                require_string(&self.cwd, "cwd")?;
            }
            EventType::PreToolUse | EventType::PostToolUse => {
                require_string(&self.tool, "tool")?;
            }
            EventType::Error => {
                require_string(&self.message, "message")?;
            }
            EventType::SessionEnd => {}
        }

        Ok(())
    }
}

pub fn parse_event(params: Value) -> Result<EventEnvelope, ErrorInfo> {
    let envelope: EventEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

fn require_string(value: &Option<String>, field: &str) -> Result<(), ErrorInfo> {
    if let Some(candidate) = value {
        if !candidate.trim().is_empty() {
            return Ok(());
        }
    }
    Err(ErrorInfo::new(
        "missing_field",
        format!("{} is required", field),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_event(event_type: EventType) -> EventEnvelope {
        EventEnvelope {
            event_id: "evt-1".to_string(),
            recorded_at: "2026-01-30T12:00:00Z".to_string(),
            event_type,
            session_id: Some("session-1".to_string()),
            cwd: Some("/repo".to_string()),
            tool: None,
            file_path: None,
            message: None,
        }
    }

    #[test]
    fn validates_session_start() {
        let event = base_event(EventType::SessionStart);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn session_start_requires_cwd() {
        let mut event = base_event(EventType::SessionStart);
        event.cwd = None;
        assert!(event.validate().is_err());
    }

    #[test]
    fn tool_use_requires_tool() {
        let event = base_event(EventType::PostToolUse);
        assert!(event.validate().is_err());

        let mut event = base_event(EventType::PreToolUse);
        event.tool = Some("Read".to_string());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn error_requires_message() {
        let event = base_event(EventType::Error);
        let err = event.validate().unwrap_err();
        assert_eq!(err.code, "missing_field");
    }

    #[test]
    fn session_end_needs_no_session_fields() {
        let mut event = base_event(EventType::SessionEnd);
        event.session_id = None;
        event.cwd = None;
        assert!(event.validate().is_ok());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let mut event = base_event(EventType::SessionEnd);
        event.recorded_at = "not-a-time".to_string();
        assert!(event.validate().is_err());
    }

    #[test]
    fn rejects_long_event_id() {
        let mut event = base_event(EventType::SessionEnd);
        event.event_id = "a".repeat(256);
        assert!(event.validate().is_err());
    }

    #[test]
    fn parse_request_rejects_version_mismatch() {
        let line = json!({"protocol_version": 99, "method": "get_status"}).to_string();
        let err = parse_request(&line).unwrap_err();
        assert_eq!(err.code, "protocol_mismatch");
    }

    #[test]
    fn parse_request_rejects_unknown_method() {
        let line = json!({"protocol_version": 1, "method": "format_disk"}).to_string();
        let err = parse_request(&line).unwrap_err();
        assert_eq!(err.code, "invalid_json");
    }

    #[test]
    fn parse_request_accepts_params() {
        let line = json!({
            "protocol_version": 1,
            "method": "update_file_status",
            "id": "req-1",
            "params": {"path": "/repo/a.rs", "status": "writing"}
        })
        .to_string();
        let request = parse_request(&line).expect("request");
        assert_eq!(request.method, Method::UpdateFileStatus);

        let params: UpdateFileStatusParams = parse_params(request.params).expect("params");
        assert_eq!(params.status, FileStatus::Writing);
    }

    #[test]
    fn parse_params_requires_object() {
        let err = parse_params::<AddFilesParams>(None).unwrap_err();
        assert_eq!(err.code, "missing_params");
    }

    #[test]
    fn file_status_uses_lowercase_names() {
        assert_eq!(FileStatus::Added.to_string(), "added");
        let err = parse_params::<UpdateFileStatusParams>(Some(json!({
            "path": "/repo/a.rs",
            "status": "deleted"
        })))
        .unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }
}
