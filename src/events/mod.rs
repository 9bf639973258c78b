//! Sync events and the event bus
//!
//! Every signal in the engine travels as a [`SyncEvent`] through one
//! [`SyncEventQueue`]. The queue hands events to a [`SyncEventManager`],
//! which offers each event to its handlers from the highest priority down
//! until one of them consumes it.

pub mod folder;
pub mod manager;
pub mod queue;

pub use folder::{
    AbstractFolderEvent, ContentChangeType, FileEvent, FolderEvent, MetaDataChangeType,
    ObjectChange,
};
pub use manager::{
    priorities, DebugLoggingHandler, FnHandler, HandlerId, Outcome, SyncEventHandler,
    SyncEventManager,
};
pub use queue::{EventSink, QueueHandle, QueueStats, SyncEventQueue};

use chrono::{DateTime, Utc};
use std::fmt;

/// Category an event is counted under while it sits in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    SyncRequested,
    DetectedChange,
}

impl EventCategory {
    pub const ALL: [EventCategory; 2] = [EventCategory::SyncRequested, EventCategory::DetectedChange];
}

/// Request for a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartNextSyncEvent {
    pub full_sync_requested: bool,
    /// Skip debug logging, used for periodic triggers
    pub quiet: bool,
    /// Keep out of the queue's in-flight counters
    pub uncounted: bool,
    pub requested_at: DateTime<Utc>,
}

impl StartNextSyncEvent {
    pub fn new(full_sync_requested: bool) -> Self {
        Self {
            full_sync_requested,
            quiet: false,
            uncounted: false,
            requested_at: Utc::now(),
        }
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn uncounted(mut self) -> Self {
        self.uncounted = true;
        self
    }
}

/// Published after the last event of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSyncCompletedEvent {
    /// The request that started the pass
    pub start: StartNextSyncEvent,
    pub events_published: usize,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    StartNextSync(StartNextSyncEvent),
    FullSyncCompleted(FullSyncCompletedEvent),
    Object(AbstractFolderEvent),
}

impl SyncEvent {
    /// Counter category, `None` for events that are not counted.
    ///
    /// Completion events are never counted; the other events opt out one by
    /// one through their `uncounted` flag.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            SyncEvent::StartNextSync(e) if !e.uncounted => Some(EventCategory::SyncRequested),
            SyncEvent::Object(e) if !e.change().uncounted => Some(EventCategory::DetectedChange),
            _ => None,
        }
    }

    /// Whether the queue logs this event at debug level
    pub fn logs_debug(&self) -> bool {
        match self {
            SyncEvent::StartNextSync(e) => !e.quiet,
            SyncEvent::Object(e) => !e.change().quiet,
            SyncEvent::FullSyncCompleted(_) => true,
        }
    }

    /// Notifications offered to every handler, whatever the outcome
    pub fn is_broadcast(&self) -> bool {
        matches!(self, SyncEvent::FullSyncCompleted(_))
    }

    pub fn as_object(&self) -> Option<&AbstractFolderEvent> {
        match self {
            SyncEvent::Object(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AbstractFolderEvent> for SyncEvent {
    fn from(event: AbstractFolderEvent) -> Self {
        SyncEvent::Object(event)
    }
}

impl From<StartNextSyncEvent> for SyncEvent {
    fn from(event: StartNextSyncEvent) -> Self {
        SyncEvent::StartNextSync(event)
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::StartNextSync(e) => {
                write!(f, "StartNextSyncEvent [full sync: {}]", e.full_sync_requested)
            }
            SyncEvent::FullSyncCompleted(e) => {
                write!(f, "FullSyncCompletedEvent [published: {}]", e.events_published)
            }
            SyncEvent::Object(e) => e.fmt(f),
        }
    }
}
