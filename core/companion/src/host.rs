//! Request dispatch for the line protocol.
//!
//! One `Host` owns the tracker for the life of the process. Tracker
//! notifications are buffered in an outbox and written by the runtime after
//! each request or timer round, ahead of the request's response.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use companion_core::{
    AssistantEvent, CliClient, CompanionConfig, Launcher, StorageConfig, Tracker,
    WindowState,
};
use companion_protocol::{
    parse_event, parse_params, parse_request, AddFilesParams, ErrorInfo, Method, Notification,
    OpenWindowParams, RemoveFileParams, Request, Response, SendMessageParams,
    SwitchSessionParams, UpdateFileStatusParams, WindowStateParams,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub struct Host {
    tracker: Tracker,
    storage: StorageConfig,
    launcher: Option<Launcher>,
    outbox: Rc<RefCell<Vec<Notification>>>,
}

impl Host {
    pub fn new(
        root: PathBuf,
        config: CompanionConfig,
        storage: StorageConfig,
        skip_permissions: bool,
    ) -> Self {
        let tracker = Tracker::builder(root)
            .config(config.tracker)
            .probe_config(config.probe)
            .client(CliClient::default().skip_permissions(skip_permissions))
            .build();
        let launcher = match Launcher::current() {
            Ok(launcher) => Some(launcher),
            Err(err) => {
                warn!(error = %err, "Instance launching unavailable");
                None
            }
        };
        Self::with_parts(tracker, storage, launcher)
    }

    pub fn with_parts(mut tracker: Tracker, storage: StorageConfig, launcher: Option<Launcher>) -> Self {
        let outbox = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&outbox);
        tracker.subscribe_all(move |event| {
            sink.borrow_mut()
                .push(Notification::new(event.kind().as_str(), event.data()));
        });
        Self {
            tracker,
            storage,
            launcher,
            outbox,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    /// Notifications produced since the last call, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    pub fn handle_line(&mut self, line: &str) -> Response {
        match parse_request(line) {
            Ok(request) => self.handle(request),
            Err(err) => {
                warn!(code = %err.code, message = %err.message, "Rejected request");
                Response::error_with_info(None, err)
            }
        }
    }

    pub fn handle(&mut self, request: Request) -> Response {
        debug!(method = ?request.method, id = ?request.id, "Request received");
        let id = request.id.clone();
        match self.dispatch(request) {
            Ok(data) => Response::ok(id, data),
            Err(err) => Response::error_with_info(id, err),
        }
    }

    fn dispatch(&mut self, request: Request) -> Result<Value, ErrorInfo> {
        let tracker = &mut self.tracker;
        match request.method {
            Method::Initialize => {
                tracker.initialize();
                to_data(&tracker.connection_status())
            }
            Method::DiscoverSessions => {
                let sessions = tracker.discover_sessions();
                Ok(json!({ "sessions": to_data(&sessions)? }))
            }
            Method::SwitchSession => {
                let params: SwitchSessionParams = parse_params(request.params)?;
                let switched = tracker.switch_to_session(&params.session_id);
                Ok(json!({ "switched": switched }))
            }
            Method::AddFiles => {
                let params: AddFilesParams = parse_params(request.params)?;
                tracker.add_files_to_context(&params.paths);
                to_data(&tracker.connection_status())
            }
            Method::RemoveFile => {
                let params: RemoveFileParams = parse_params(request.params)?;
                let removed = tracker.remove_file_from_context(&params.path);
                Ok(json!({ "removed": removed }))
            }
            Method::UpdateFileStatus => {
                let params: UpdateFileStatusParams = parse_params(request.params)?;
                let updated = tracker.update_file_status(&params.path, params.status);
                Ok(json!({ "updated": updated }))
            }
            Method::StartSession => {
                let session = tracker.start_new_session();
                Ok(json!({ "session": to_data(&session)? }))
            }
            Method::EndSession => {
                let ended = tracker.end_current_session();
                Ok(json!({ "ended": ended }))
            }
            Method::Disconnect => {
                tracker.disconnect();
                to_data(&tracker.connection_status())
            }
            Method::GetStatus => to_data(&tracker.connection_status()),
            Method::SendMessage => {
                let params: SendMessageParams = parse_params(request.params)?;
                let reply = tracker.send_message(&params.message);
                Ok(json!({ "reply": reply }))
            }
            Method::Event => {
                let params = request
                    .params
                    .ok_or_else(|| ErrorInfo::new("missing_params", "event is required"))?;
                let envelope = parse_event(params)?;
                let event = AssistantEvent::from_envelope(&envelope).ok_or_else(|| {
                    ErrorInfo::new("invalid_event", "event is missing required fields")
                })?;
                tracker.handle_event(event);
                Ok(json!({ "accepted": true, "event_id": envelope.event_id }))
            }
            Method::OpenWindow => {
                let params: OpenWindowParams = parse_params(request.params)?;
                let launcher = self.launcher.as_ref().ok_or_else(|| {
                    ErrorInfo::new("launch_unavailable", "cannot locate companion executable")
                })?;
                to_data(&launcher.launch_instance(&params.directory))
            }
            Method::SaveWindowState => {
                let params: WindowStateParams = parse_params(request.params)?;
                let state = WindowState {
                    width: params.width,
                    height: params.height,
                    x: params.x,
                    y: params.y,
                };
                state
                    .save(&self.storage.window_state_file())
                    .map_err(|err| ErrorInfo::new("io_error", err.to_string()))?;
                to_data(&state)
            }
            Method::GetWindowState => {
                to_data(&WindowState::load(&self.storage.window_state_file()))
            }
        }
    }
}

fn to_data<T: Serialize>(value: &T) -> Result<Value, ErrorInfo> {
    serde_json::to_value(value).map_err(|err| {
        ErrorInfo::new(
            "serialization_error",
            format!("failed to serialize response: {}", err),
        )
    })
}
