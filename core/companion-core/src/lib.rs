//! # companion-core
//!
//! Session and activity tracking for an external coding assistant: whether it
//! is reachable, which session is followed, which files it is touching and
//! what it is doing right now. Presenters subscribe to typed notifications
//! and never mutate tracker state directly.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Deferred work goes through
//!   a timer queue the host drains with `Tracker::run_due`.
//! - **Not thread-safe**: Hosts own the tracker on one thread and feed it
//!   requests and assistant events.
//! - **Graceful degradation**: Probe, discovery and load failures become
//!   notifications; missing files load as defaults.
//! - **Swappable ports**: Clock, connectivity probe, session source,
//!   working-set source, activity source and client are traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use companion_core::{EventKind, Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::new("/path/to/project", TrackerConfig::default());
//! tracker.subscribe(EventKind::ActivityChanged, |event| println!("{:?}", event));
//! tracker.initialize();
//! ```

pub mod activity;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod launcher;
pub mod loader;
pub mod probe;
pub mod sessions;
pub mod storage;
pub mod timers;
pub mod tracker;
pub mod types;
pub mod window_state;
pub mod working_set;

// Re-export commonly used items at crate root
pub use activity::{ActivityContext, ActivitySource, RandomizedActivity};
pub use client::{AssistantClient, CliClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use error::{CompanionError, Result};
pub use events::{EventBus, EventKind, SubscriptionId, TrackerEvent};
pub use ingest::AssistantEvent;
pub use launcher::{resolve_initial_directory, LaunchResult, Launcher};
pub use loader::{SimulatedWorkingSet, WorkingSetSource};
pub use probe::{ConnectionProbe, EnvProbe, ProbeChain, ProcessProbe, SocketProbe};
pub use sessions::{local_session_id, LocalSessionSource, SessionSource};
pub use storage::*;
pub use tracker::{ConnectionPhase, Tracker, TrackerBuilder};
pub use types::*;
pub use window_state::WindowState;
pub use working_set::WorkingSet;
