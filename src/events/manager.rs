//! Sync Event Manager
//!
//! Priority-ordered handler chain. Handlers are registered together with
//! their priority; an event is offered to the handlers from the highest
//! priority down and the first one that returns [`Outcome::Consumed`] owns it.

use super::SyncEvent;
use crate::error::SyncError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of offering an event to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler owns the event; no further handler sees it
    Consumed,
    /// The event moves on to the next handler
    Passed,
}

/// Well-known handler priorities. Larger values are offered events first.
///
/// Completion events are broadcast, so the crawler sees the end of its pass
/// even below handlers that consume everything.
pub mod priorities {
    /// Logging taps that observe every event
    pub const DEBUG: i32 = 100_000;
    /// Handlers that drop events for ignored objects
    pub const FILTER: i32 = 10_000;
    /// The descendants crawler
    pub const CRAWLER: i32 = 1_000;
    pub const DEFAULT: i32 = 0;
}

pub trait SyncEventHandler: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    fn handle(&self, event: &SyncEvent) -> Result<Outcome, SyncError>;
}

/// Token returned on registration, used to remove the handler again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    priority: i32,
    handler: Arc<dyn SyncEventHandler>,
}

#[derive(Default)]
pub struct SyncEventManager {
    /// Ascending priority; equal priorities in registration order
    handlers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl SyncEventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_handler(&self, priority: i32, handler: Arc<dyn SyncEventHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write();
        // Equal priorities go in front of their peers so the reversed walk
        // visits them in registration order.
        let pos = handlers.partition_point(|r| r.priority < priority);
        debug!(handler = handler.name(), priority, "Registering sync event handler");
        handlers.insert(
            pos,
            Registration {
                id,
                priority,
                handler,
            },
        );
        id
    }

    /// Remove a handler; false if it was not registered
    pub fn remove_event_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.iter().position(|r| r.id == id) {
            Some(pos) => {
                let removed = handlers.remove(pos);
                debug!(handler = removed.handler.name(), "Removed sync event handler");
                true
            }
            None => false,
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Offer `event` to the handlers from the highest priority down.
    ///
    /// The handler list is copied before dispatch, so handlers may register
    /// or remove handlers while they run. A handler error stops the walk.
    /// Broadcast events are offered to every handler regardless of outcome;
    /// a failing handler does not hide them from the rest and the first
    /// error is returned once all handlers ran.
    pub fn handle(&self, event: &SyncEvent) -> Result<Outcome, SyncError> {
        let handlers: Vec<Registration> = self.handlers.read().clone();
        if event.is_broadcast() {
            return Self::broadcast(&handlers, event);
        }
        for registration in handlers.iter().rev() {
            let outcome = registration.handle(event)?;
            if outcome == Outcome::Consumed {
                trace!(handler = registration.handler.name(), "Event consumed");
                return Ok(Outcome::Consumed);
            }
        }
        Ok(Outcome::Passed)
    }

    fn broadcast(handlers: &[Registration], event: &SyncEvent) -> Result<Outcome, SyncError> {
        let mut outcome = Outcome::Passed;
        let mut first_error = None;
        for registration in handlers.iter().rev() {
            match registration.handle(event) {
                Ok(Outcome::Consumed) => outcome = Outcome::Consumed,
                Ok(Outcome::Passed) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}

impl Registration {
    fn handle(&self, event: &SyncEvent) -> Result<Outcome, SyncError> {
        self.handler
            .handle(event)
            .map_err(|e| SyncError::HandlerFailed {
                handler: self.handler.name().to_string(),
                message: e.to_string(),
            })
    }
}

/// Closure-backed handler
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&SyncEvent) -> Result<Outcome, SyncError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> SyncEventHandler for FnHandler<F>
where
    F: Fn(&SyncEvent) -> Result<Outcome, SyncError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &SyncEvent) -> Result<Outcome, SyncError> {
        (self.func)(event)
    }
}

/// Logs every event and passes it on; register at [`priorities::DEBUG`]
#[derive(Debug, Default)]
pub struct DebugLoggingHandler;

impl SyncEventHandler for DebugLoggingHandler {
    fn name(&self) -> &str {
        "debug-logging"
    }

    fn handle(&self, event: &SyncEvent) -> Result<Outcome, SyncError> {
        if event.logs_debug() {
            debug!(event = %event, "Sync event");
        }
        Ok(Outcome::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StartNextSyncEvent;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        name: &str,
        outcome: Outcome,
    ) -> Arc<dyn SyncEventHandler> {
        let log = Arc::clone(log);
        let label = name.to_string();
        Arc::new(FnHandler::new(name, move |_| {
            log.lock().push(label.clone());
            Ok(outcome)
        }))
    }

    fn start() -> SyncEvent {
        SyncEvent::from(StartNextSyncEvent::new(false))
    }

    #[test]
    fn test_highest_priority_first_and_consumption_stops_walk() {
        let manager = SyncEventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.add_event_handler(1, recorder(&log, "low", Outcome::Consumed));
        manager.add_event_handler(10, recorder(&log, "high", Outcome::Passed));
        manager.add_event_handler(5, recorder(&log, "mid", Outcome::Consumed));

        assert_eq!(manager.handle(&start()).unwrap(), Outcome::Consumed);
        assert_eq!(*log.lock(), vec!["high", "mid"]);
    }

    #[test]
    fn test_equal_priorities_in_registration_order() {
        let manager = SyncEventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.add_event_handler(3, recorder(&log, "first", Outcome::Passed));
        manager.add_event_handler(3, recorder(&log, "second", Outcome::Passed));
        manager.add_event_handler(3, recorder(&log, "third", Outcome::Passed));

        assert_eq!(manager.handle(&start()).unwrap(), Outcome::Passed);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_handler() {
        let manager = SyncEventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = manager.add_event_handler(1, recorder(&log, "gone", Outcome::Consumed));
        assert!(manager.remove_event_handler(id));
        assert!(!manager.remove_event_handler(id));
        assert_eq!(manager.handle(&start()).unwrap(), Outcome::Passed);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_error_names_handler() {
        let manager = SyncEventManager::new();
        manager.add_event_handler(
            0,
            Arc::new(FnHandler::new("broken", |_| {
                Err(SyncError::RemoteError("boom".to_string()))
            })),
        );
        match manager.handle(&start()).unwrap_err() {
            SyncError::HandlerFailed { handler, message } => {
                assert_eq!(handler, "broken");
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_completion_reaches_every_handler() {
        use crate::events::FullSyncCompletedEvent;

        let manager = SyncEventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.add_event_handler(10, recorder(&log, "greedy", Outcome::Consumed));
        manager.add_event_handler(
            5,
            Arc::new(FnHandler::new("broken", |_| {
                Err(SyncError::RemoteError("boom".to_string()))
            })),
        );
        manager.add_event_handler(1, recorder(&log, "crawler", Outcome::Passed));

        let done = SyncEvent::FullSyncCompleted(FullSyncCompletedEvent {
            start: StartNextSyncEvent::new(false),
            events_published: 0,
        });
        let err = manager.handle(&done).unwrap_err();
        assert!(matches!(err, SyncError::HandlerFailed { ref handler, .. } if handler == "broken"));
        assert_eq!(*log.lock(), vec!["greedy", "crawler"]);
    }

    proptest! {
        #[test]
        fn prop_visit_order_is_priority_desc_then_registration(
            priorities in proptest::collection::vec(-5i32..5, 0..20)
        ) {
            let manager = SyncEventManager::new();
            let log = Arc::new(Mutex::new(Vec::new()));
            for (i, p) in priorities.iter().enumerate() {
                manager.add_event_handler(*p, recorder(&log, &i.to_string(), Outcome::Passed));
            }
            manager.handle(&start()).unwrap();

            let mut expected: Vec<usize> = (0..priorities.len()).collect();
            expected.sort_by_key(|&i| (std::cmp::Reverse(priorities[i]), i));
            let expected: Vec<String> = expected.iter().map(|i| i.to_string()).collect();
            prop_assert_eq!(log.lock().clone(), expected);
        }
    }
}
