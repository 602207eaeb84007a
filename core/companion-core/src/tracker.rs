//! Session/activity tracker.
//!
//! Mirrors an external coding-assistant process: connection state, the
//! sessions it exposes, the session currently followed, the files it is
//! touching and a one-line activity label.
//!
//! ## State machine
//!
//! ```text
//! Disconnected ──initialize()──▶ Connecting ──probe ok──▶ Connected(no session)
//!      ▲                              │                        │ switch / start
//!      │                         probe failed                  ▼
//!      └──────────── disconnect() ◀───┴──────────────── Connected(session)
//! ```
//!
//! ## Dispatch
//!
//! Every public operation mutates state and queues notifications, then
//! flushes the queue to subscribers. Nothing suspends in the middle of an
//! update; deferred work (working-set loads, activity reverts, polling) goes
//! through the `TimerQueue` and runs from `run_due`, which the host calls
//! whenever `next_deadline` passes.
//!
//! No operation panics or returns an error. Probe failures surface as
//! `ConnectionChanged { connected: false, error }`, source and client
//! failures as `Error` notifications, and unknown ids or paths are no-ops.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::activity::{self, ActivityContext, ActivitySource, RandomizedActivity};
use crate::client::AssistantClient;
use crate::clock::{Clock, SystemClock};
use crate::config::{ProbeConfig, TrackerConfig};
use crate::events::{EventBus, EventKind, SubscriptionId, TrackerEvent};
use crate::ingest::AssistantEvent;
use crate::loader::{SimulatedWorkingSet, WorkingSetSource};
use crate::probe::{ConnectionProbe, ProbeChain};
use crate::sessions::{LocalSessionSource, SessionSource};
use crate::timers::{DeferredAction, TimerQueue, TimerSlot};
use crate::types::{project_name_for, ConnectionStatus, FileStatus, Session, TrackedFile};
use crate::working_set::WorkingSet;

/// Upper bound on actions fired per `run_due` call; zero-delay timers that
/// reschedule themselves would otherwise spin.
const MAX_TIMER_ROUNDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

pub struct Tracker {
    root: PathBuf,
    config: TrackerConfig,
    clock: Box<dyn Clock>,
    probe: Box<dyn ConnectionProbe>,
    session_source: Box<dyn SessionSource>,
    working_set_source: Box<dyn WorkingSetSource>,
    activity_source: Box<dyn ActivitySource>,
    client: Option<Box<dyn AssistantClient>>,

    phase: ConnectionPhase,
    current_session: Option<String>,
    sessions: Vec<Session>,
    working_set: WorkingSet,
    activity: String,
    activity_changed_at: DateTime<Utc>,
    polling: bool,

    timers: TimerQueue,
    pending: Vec<TrackerEvent>,
    bus: EventBus,
}

impl Tracker {
    /// Tracker rooted at `root` with default ports.
    pub fn new(root: impl Into<PathBuf>, config: TrackerConfig) -> Self {
        TrackerBuilder::new(root).config(config).build()
    }

    pub fn builder(root: impl Into<PathBuf>) -> TrackerBuilder {
        TrackerBuilder::new(root)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&TrackerEvent) + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    pub fn subscribe_all<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&TrackerEvent) + 'static,
    {
        self.bus.subscribe_all(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read model
    // ─────────────────────────────────────────────────────────────────────────

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current_session.as_deref()?;
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn active_files(&self) -> Vec<TrackedFile> {
        self.working_set.files()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Point-in-time snapshot for presenters.
    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.is_connected(),
            session_id: self.current_session.clone(),
            activity: self.activity.clone(),
            context_file_count: self.working_set.len(),
            active_files: self.working_set.files(),
        }
    }

    /// When the host should next call `run_due`.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────────────────────

    /// Probes the assistant and connects on success. Returns whether the
    /// tracker ended up connected.
    pub fn initialize(&mut self) -> bool {
        let connected = self.initialize_inner();
        self.flush();
        connected
    }

    pub fn disconnect(&mut self) {
        info!(root = %self.root.display(), "Disconnecting from assistant");
        self.reset_to_disconnected();
        self.emit(TrackerEvent::ConnectionChanged {
            connected: false,
            error: None,
        });
        self.set_activity(activity::DISCONNECTED);
        self.emit_files_changed();
        self.flush();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the known sessions with what the session source reports.
    pub fn discover_sessions(&mut self) -> Vec<Session> {
        let sessions = self.discover_sessions_inner();
        self.flush();
        sessions
    }

    /// Makes `session_id` current. Returns false for an unknown id.
    pub fn switch_to_session(&mut self, session_id: &str) -> bool {
        let switched = self.switch_inner(session_id);
        self.flush();
        switched
    }

    /// Fabricates a fresh session at the tracker root and makes it current.
    pub fn start_new_session(&mut self) -> Option<Session> {
        if !self.is_connected() {
            debug!("Ignoring start_new_session while disconnected");
            return None;
        }

        let now = self.clock.now();
        let id = ulid::Ulid::new().to_string();
        let name = format!("Session {}", &id[id.len().saturating_sub(6)..]);
        let session = Session::new(id.clone(), name, &self.root, now);
        self.sessions.push(session);
        self.make_current(&id);
        info!(session_id = %id, "Started new session");

        let current = self.current_session().cloned();
        self.emit(TrackerEvent::SessionChanged {
            session: current.clone(),
        });
        self.emit_sessions();
        self.flush();
        current
    }

    /// Clears the current session and its working set. Returns false when no
    /// session was current.
    pub fn end_current_session(&mut self) -> bool {
        let ended = self.end_current_inner();
        self.flush();
        ended
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Working set
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds paths with status `Added`; duplicates collapse into one entry.
    pub fn add_files_to_context<S: AsRef<str>>(&mut self, paths: &[S]) {
        if !self.is_connected() {
            debug!(count = paths.len(), "Ignoring add_files_to_context while disconnected");
            return;
        }
        if paths.is_empty() {
            return;
        }

        let unique: HashSet<&str> = paths.iter().map(|path| path.as_ref()).collect();
        let count = unique.len();
        let now = self.clock.now();
        for path in paths {
            self.working_set.upsert(path.as_ref(), FileStatus::Added, now);
        }
        self.emit_files_changed();

        self.set_activity(activity::adding_files(count));
        self.set_activity_for(
            activity::added_files(count),
            self.config.activity_revert_delay(),
        );
        self.flush();
    }

    /// Returns false (and emits nothing) for an untracked path.
    pub fn update_file_status(&mut self, path: &str, status: FileStatus) -> bool {
        let now = self.clock.now();
        if !self.working_set.update_status(path, status, now) {
            debug!(path, status = %status, "Ignoring status update for untracked file");
            return false;
        }
        self.emit_files_changed();
        self.flush();
        true
    }

    /// Removes the path if tracked and always reports the resulting list.
    pub fn remove_file_from_context(&mut self, path: &str) -> bool {
        let removed = self.working_set.remove(path);
        self.emit_files_changed();
        self.flush();
        removed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Assistant traffic
    // ─────────────────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: AssistantEvent) {
        if !self.is_connected() {
            debug!(event = ?event, "Ignoring assistant event while disconnected");
            return;
        }

        match event {
            AssistantEvent::ToolUse { tool } => {
                self.set_activity_for(
                    activity::using_tool(&tool),
                    self.config.tool_activity_delay(),
                );
            }
            AssistantEvent::FileRead { path } => {
                self.touch_file(&path, FileStatus::Reading);
                let label = activity::reading(&self.root, &path);
                self.set_activity(label);
            }
            AssistantEvent::FileWrite { path } => {
                self.touch_file(&path, FileStatus::Writing);
                let label = activity::writing(&self.root, &path);
                self.set_activity(label);
            }
            AssistantEvent::SessionStart { session_id, cwd } => {
                self.adopt_session(&session_id, Path::new(&cwd));
            }
            AssistantEvent::SessionEnd => {
                self.end_current_inner();
            }
            AssistantEvent::Error { message } => {
                warn!(message = %message, "Assistant reported an error");
                self.emit(TrackerEvent::Error { message });
            }
        }
        self.flush();
    }

    /// Forwards a prompt to the assistant client. Failures become `Error`
    /// notifications.
    pub fn send_message(&mut self, message: &str) -> Option<String> {
        if !self.is_connected() {
            debug!("Ignoring send_message while disconnected");
            return None;
        }
        let Some(client) = self.client.as_ref() else {
            debug!("No assistant client configured");
            return None;
        };

        match client.query(message) {
            Ok(reply) => Some(reply),
            Err(err) => {
                warn!(error = %err, "Assistant query failed");
                self.emit(TrackerEvent::Error {
                    message: err.to_string(),
                });
                self.flush();
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Polling and timers
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts activity polling. No-op while disconnected, when disabled in
    /// config, or when already polling.
    pub fn start_polling(&mut self) {
        self.start_polling_inner();
    }

    pub fn stop_polling(&mut self) {
        self.polling = false;
        self.timers.cancel(TimerSlot::Poll);
    }

    /// Fires every deferred action that is due. Returns how many ran.
    pub fn run_due(&mut self) -> usize {
        let mut fired = 0;
        while fired < MAX_TIMER_ROUNDS {
            let now = self.clock.now();
            let Some(action) = self.timers.pop_due(now) else {
                break;
            };
            self.fire(action);
            fired += 1;
        }
        self.flush();
        fired
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals (never flush)
    // ─────────────────────────────────────────────────────────────────────────

    fn initialize_inner(&mut self) -> bool {
        let was_connected = self.is_connected();
        self.phase = ConnectionPhase::Connecting;
        debug!(root = %self.root.display(), "Probing assistant");

        match self.probe.probe() {
            Ok(()) => {
                self.phase = ConnectionPhase::Connected;
                info!(root = %self.root.display(), "Connected to assistant");
                self.emit(TrackerEvent::ConnectionChanged {
                    connected: true,
                    error: None,
                });
                self.set_activity(activity::CONNECTED);

                let sessions = self.discover_sessions_inner();
                if !sessions.is_empty() {
                    self.start_polling_inner();
                    if self.config.auto_attach && self.current_session.is_none() {
                        let first = sessions[0].id.clone();
                        self.switch_inner(&first);
                    }
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "Assistant not reachable");
                let had_session = self.current_session.is_some();
                let had_files = !self.working_set.is_empty();
                self.reset_to_disconnected();

                self.emit(TrackerEvent::ConnectionChanged {
                    connected: false,
                    error: Some(err.to_string()),
                });
                self.set_activity(activity::NOT_RUNNING);
                if was_connected && had_session {
                    self.emit(TrackerEvent::SessionChanged { session: None });
                }
                if was_connected && had_files {
                    self.emit_files_changed();
                }
                false
            }
        }
    }

    fn discover_sessions_inner(&mut self) -> Vec<Session> {
        if !self.is_connected() {
            debug!("Skipping session discovery while disconnected");
            return Vec::new();
        }

        let now = self.clock.now();
        let found = match self.session_source.discover(&self.root, now) {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "Session discovery failed");
                self.emit(TrackerEvent::Error {
                    message: err.to_string(),
                });
                return self.sessions.clone();
            }
        };

        let mut seen = HashSet::new();
        let mut sessions: Vec<Session> = found
            .into_iter()
            .filter(|session| seen.insert(session.id.clone()))
            .collect();
        for session in sessions.iter_mut() {
            if let Some(previous) = self.sessions.iter().find(|s| s.id == session.id) {
                session.started_at = previous.started_at;
            }
        }
        self.sessions = sessions;

        let current_vanished = self
            .current_session
            .as_ref()
            .map_or(false, |id| !self.sessions.iter().any(|s| &s.id == id));
        if current_vanished {
            info!("Current session no longer reported; clearing it");
            self.current_session = None;
            self.timers.cancel(TimerSlot::SessionLoad);
            self.working_set.clear();
            self.emit(TrackerEvent::SessionChanged { session: None });
            self.emit_files_changed();
        }

        let current = self.current_session.clone();
        self.mark_active(current.as_deref());
        info!(count = self.sessions.len(), "Sessions discovered");
        self.emit_sessions();
        self.sessions.clone()
    }

    fn switch_inner(&mut self, session_id: &str) -> bool {
        if !self.sessions.iter().any(|session| session.id == session_id) {
            debug!(session_id, "Ignoring switch to unknown session");
            return false;
        }

        self.make_current(session_id);
        self.working_set.clear();

        let session = self.current_session().cloned();
        let project = session
            .as_ref()
            .map(|s| s.project_name.clone())
            .unwrap_or_default();
        info!(session_id, project = %project, "Switched session");

        self.emit(TrackerEvent::SessionChanged { session });
        self.emit_sessions();
        self.set_activity(activity::switched_to(&project));
        self.emit_files_changed();

        let now = self.clock.now();
        self.timers.schedule(
            now,
            self.config.settle_delay(),
            DeferredAction::LoadWorkingSet {
                session_id: session_id.to_string(),
            },
        );
        true
    }

    fn end_current_inner(&mut self) -> bool {
        let Some(session_id) = self.current_session.take() else {
            debug!("No current session to end");
            return false;
        };
        info!(session_id = %session_id, "Ended session");

        self.timers.cancel(TimerSlot::SessionLoad);
        self.mark_active(None);
        self.working_set.clear();

        self.emit(TrackerEvent::SessionChanged { session: None });
        self.emit_sessions();
        self.emit_files_changed();
        self.set_activity(activity::SESSION_ENDED);
        true
    }

    /// Registers a session the assistant announced and makes it current.
    fn adopt_session(&mut self, session_id: &str, cwd: &Path) {
        let previous = self.current_session.clone();
        if !self.sessions.iter().any(|session| session.id == session_id) {
            let now = self.clock.now();
            let name = project_name_for(cwd);
            self.sessions
                .push(Session::new(session_id, name, cwd, now));
        }
        self.make_current(session_id);
        info!(session_id, cwd = %cwd.display(), "Assistant session started");

        if previous.as_deref().is_some_and(|id| id != session_id) {
            self.timers.cancel(TimerSlot::SessionLoad);
            if !self.working_set.is_empty() {
                self.working_set.clear();
                self.emit_files_changed();
            }
        }

        let session = self.current_session().cloned();
        self.emit(TrackerEvent::SessionChanged { session });
        self.emit_sessions();
        self.set_activity(activity::SESSION_STARTED);
    }

    fn load_working_set(&mut self, session_id: &str) {
        if self.current_session.as_deref() != Some(session_id) {
            debug!(session_id, "Dropping working-set load for stale session");
            return;
        }
        let Some(session) = self.current_session().cloned() else {
            return;
        };

        match self.working_set_source.load(&session) {
            Ok(files) => {
                let now = self.clock.now();
                for (path, status) in files {
                    self.working_set.upsert(&path, status, now);
                }
                let count = self.working_set.len();
                debug!(session_id, count, "Working set loaded");
                self.emit_files_changed();
                self.set_activity(activity::loaded_files(count, &session.project_name));
            }
            Err(err) => {
                warn!(session_id, error = %err, "Failed to load working set");
                self.emit(TrackerEvent::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    fn poll_activity(&mut self) {
        if !self.polling || !self.is_connected() {
            return;
        }

        let now = self.clock.now();
        let ctx = ActivityContext {
            now,
            current: &self.activity,
            last_changed: self.activity_changed_at,
        };
        let next = self.activity_source.sample(&ctx);
        if let Some(label) = next.filter(|label| !label.is_empty() && *label != self.activity) {
            self.set_activity(label);
        }

        self.timers
            .schedule(now, self.config.poll_interval(), DeferredAction::Poll);
    }

    fn start_polling_inner(&mut self) {
        if !self.config.polling || !self.is_connected() || self.polling {
            return;
        }
        self.polling = true;
        let now = self.clock.now();
        self.timers
            .schedule(now, self.config.poll_interval(), DeferredAction::Poll);
        debug!(interval_ms = self.config.poll_interval_ms, "Activity polling started");
    }

    fn fire(&mut self, action: DeferredAction) {
        match action {
            DeferredAction::LoadWorkingSet { session_id } => self.load_working_set(&session_id),
            DeferredAction::RevertActivity => self.set_activity(activity::IDLE),
            DeferredAction::Poll => self.poll_activity(),
        }
    }

    fn reset_to_disconnected(&mut self) {
        self.timers.cancel_all();
        self.polling = false;
        self.phase = ConnectionPhase::Disconnected;
        self.current_session = None;
        self.sessions.clear();
        self.working_set.clear();
    }

    fn make_current(&mut self, session_id: &str) {
        self.current_session = Some(session_id.to_string());
        self.mark_active(Some(session_id));
    }

    fn mark_active(&mut self, session_id: Option<&str>) {
        for session in self.sessions.iter_mut() {
            session.is_active = Some(session.id.as_str()) == session_id;
        }
    }

    fn touch_file(&mut self, path: &str, status: FileStatus) {
        let now = self.clock.now();
        self.working_set.upsert(path, status, now);
        self.emit_files_changed();
    }

    /// Sets the label and cancels any pending revert.
    fn set_activity(&mut self, label: impl Into<String>) {
        let label = label.into();
        let label = if label.trim().is_empty() {
            activity::IDLE.to_string()
        } else {
            label
        };
        self.timers.cancel(TimerSlot::ActivityRevert);
        self.activity_changed_at = self.clock.now();
        self.activity = label.clone();
        self.emit(TrackerEvent::ActivityChanged { label });
    }

    /// Sets a transient label that reverts to idle after `ttl`.
    fn set_activity_for(&mut self, label: impl Into<String>, ttl: chrono::Duration) {
        self.set_activity(label);
        let now = self.clock.now();
        self.timers
            .schedule(now, ttl, DeferredAction::RevertActivity);
    }

    fn emit(&mut self, event: TrackerEvent) {
        self.pending.push(event);
    }

    fn emit_files_changed(&mut self) {
        let files = self.working_set.files();
        self.emit(TrackerEvent::FilesChanged { files });
    }

    fn emit_sessions(&mut self) {
        let sessions = self.sessions.clone();
        self.emit(TrackerEvent::SessionsDiscovered { sessions });
    }

    fn flush(&mut self) {
        debug_assert!(self.working_set.is_consistent());
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            self.bus.publish(event);
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("root", &self.root)
            .field("phase", &self.phase)
            .field("current_session", &self.current_session)
            .field("sessions", &self.sessions.len())
            .field("files", &self.working_set.len())
            .field("activity", &self.activity)
            .field("polling", &self.polling)
            .field("subscribers", &self.bus.subscriber_count())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Assembles a tracker; any port left unset gets its default adapter.
pub struct TrackerBuilder {
    root: PathBuf,
    config: TrackerConfig,
    probe_config: ProbeConfig,
    clock: Option<Box<dyn Clock>>,
    probe: Option<Box<dyn ConnectionProbe>>,
    session_source: Option<Box<dyn SessionSource>>,
    working_set_source: Option<Box<dyn WorkingSetSource>>,
    activity_source: Option<Box<dyn ActivitySource>>,
    client: Option<Box<dyn AssistantClient>>,
}

impl TrackerBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: TrackerConfig::default(),
            probe_config: ProbeConfig::default(),
            clock: None,
            probe: None,
            session_source: None,
            working_set_source: None,
            activity_source: None,
            client: None,
        }
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Used for the default probe chain when no probe is set explicitly.
    pub fn probe_config(mut self, probe_config: ProbeConfig) -> Self {
        self.probe_config = probe_config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn probe(mut self, probe: impl ConnectionProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn session_source(mut self, source: impl SessionSource + 'static) -> Self {
        self.session_source = Some(Box::new(source));
        self
    }

    pub fn working_set_source(mut self, source: impl WorkingSetSource + 'static) -> Self {
        self.working_set_source = Some(Box::new(source));
        self
    }

    pub fn activity_source(mut self, source: impl ActivitySource + 'static) -> Self {
        self.activity_source = Some(Box::new(source));
        self
    }

    pub fn client(mut self, client: impl AssistantClient + 'static) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    pub fn build(self) -> Tracker {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock));
        let now = clock.now();
        let probe_config = self.probe_config;
        let probe = self
            .probe
            .unwrap_or_else(|| Box::new(ProbeChain::from_config(&probe_config)));
        let session_source = self
            .session_source
            .unwrap_or_else(|| Box::new(LocalSessionSource));
        let working_set_source = self.working_set_source.unwrap_or_else(|| {
            Box::new(SimulatedWorkingSet::new(config.working_set_limit))
        });
        let activity_source = self.activity_source.unwrap_or_else(|| {
            Box::new(RandomizedActivity::new(
                config.poll_min_idle(),
                config.poll_max_idle(),
            ))
        });

        Tracker {
            root: self.root,
            config,
            clock,
            probe,
            session_source,
            working_set_source,
            activity_source,
            client: self.client,
            phase: ConnectionPhase::Disconnected,
            current_session: None,
            sessions: Vec::new(),
            working_set: WorkingSet::new(),
            activity: activity::IDLE.to_string(),
            activity_changed_at: now,
            polling: false,
            timers: TimerQueue::new(),
            pending: Vec::new(),
            bus: EventBus::new(),
        }
    }
}
