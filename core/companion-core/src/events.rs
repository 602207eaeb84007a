//! Tracker notifications and the publish/subscribe bus that delivers them.
//!
//! Handlers run synchronously on the thread that owns the tracker, in
//! subscription order. The tracker mutates state first and dispatches the
//! queued events afterwards, so a handler always observes settled state.

use serde_json::{json, Value};
use std::fmt;

use crate::types::{Session, TrackedFile};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    ConnectionChanged {
        connected: bool,
        error: Option<String>,
    },
    SessionChanged {
        session: Option<Session>,
    },
    SessionsDiscovered {
        sessions: Vec<Session>,
    },
    ActivityChanged {
        label: String,
    },
    FilesChanged {
        files: Vec<TrackedFile>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionChanged,
    SessionChanged,
    SessionsDiscovered,
    ActivityChanged,
    FilesChanged,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConnectionChanged => "connection_changed",
            EventKind::SessionChanged => "session_changed",
            EventKind::SessionsDiscovered => "sessions_discovered",
            EventKind::ActivityChanged => "activity_changed",
            EventKind::FilesChanged => "files_changed",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TrackerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TrackerEvent::ConnectionChanged { .. } => EventKind::ConnectionChanged,
            TrackerEvent::SessionChanged { .. } => EventKind::SessionChanged,
            TrackerEvent::SessionsDiscovered { .. } => EventKind::SessionsDiscovered,
            TrackerEvent::ActivityChanged { .. } => EventKind::ActivityChanged,
            TrackerEvent::FilesChanged { .. } => EventKind::FilesChanged,
            TrackerEvent::Error { .. } => EventKind::Error,
        }
    }

    /// JSON payload for the wire; the kind travels separately.
    pub fn data(&self) -> Value {
        match self {
            TrackerEvent::ConnectionChanged { connected, error } => {
                json!({ "connected": connected, "error": error })
            }
            TrackerEvent::SessionChanged { session } => json!({ "session": session }),
            TrackerEvent::SessionsDiscovered { sessions } => json!({ "sessions": sessions }),
            TrackerEvent::ActivityChanged { label } => json!({ "label": label }),
            TrackerEvent::FilesChanged { files } => json!({ "files": files }),
            TrackerEvent::Error { message } => json!({ "message": message }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&TrackerEvent)>;

struct Subscriber {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one notification kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&TrackerEvent) + 'static,
    {
        self.insert(Some(kind), Box::new(handler))
    }

    /// Registers a handler for every notification.
    pub fn subscribe_all<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&TrackerEvent) + 'static,
    {
        self.insert(None, Box::new(handler))
    }

    /// Returns false if the id was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: &TrackerEvent) {
        let kind = event.kind();
        for subscriber in self.subscribers.iter_mut() {
            if subscriber.kind.map_or(true, |wanted| wanted == kind) {
                (subscriber.handler)(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn insert(&mut self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber { id, kind, handler });
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
