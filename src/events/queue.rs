//! Sync Event Queue
//!
//! Single-consumer FIFO in front of a [`SyncEventManager`]. One dedicated
//! thread takes events in arrival order and dispatches them; a failing or
//! panicking handler is logged and the event dropped, the loop keeps going.
//!
//! Producers, including handlers running on the consumer thread, enqueue
//! through a cloneable [`QueueHandle`] so a handler never owns the queue
//! that dispatches to it.

use super::{EventCategory, Outcome, SyncEvent, SyncEventManager};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Anything events can be published to
pub trait EventSink: Send + Sync {
    fn add_event(&self, event: SyncEvent);

    /// True once the sink no longer accepts events
    fn is_closed(&self) -> bool {
        false
    }
}

/// Point-in-time queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Enqueued and not yet dispatched
    pub pending: usize,
    pub dispatched: usize,
    /// Dispatches that ended in a handler error or panic
    pub failed: usize,
}

struct Shared {
    sender: Mutex<Option<mpsc::UnboundedSender<SyncEvent>>>,
    suspended: Mutex<bool>,
    resumed: Condvar,
    stopped: Mutex<bool>,
    stopped_signal: Condvar,
    is_stopped: AtomicBool,
    pending: AtomicUsize,
    dispatched: AtomicUsize,
    failed: AtomicUsize,
    total: watch::Sender<usize>,
    categories: HashMap<EventCategory, watch::Sender<usize>>,
}

impl Shared {
    fn new(sender: mpsc::UnboundedSender<SyncEvent>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            suspended: Mutex::new(false),
            resumed: Condvar::new(),
            stopped: Mutex::new(false),
            stopped_signal: Condvar::new(),
            is_stopped: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            dispatched: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            total: watch::channel(0).0,
            categories: EventCategory::ALL
                .iter()
                .map(|c| (*c, watch::channel(0).0))
                .collect(),
        }
    }

    fn add_event(&self, event: SyncEvent) {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            warn!(event = %event, "Event queue is stopped, dropping event");
            return;
        };
        let category = event.category();
        // Count before sending so the consumer can never decrement first.
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.adjust_counters(category, true);
        if event.logs_debug() {
            debug!(event = %event, "Enqueued sync event");
        }
        if let Err(rejected) = sender.send(event) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.adjust_counters(category, false);
            warn!(event = %rejected.0, "Event consumer is gone, dropping event");
        }
    }

    fn adjust_counters(&self, category: Option<EventCategory>, up: bool) {
        let Some(category) = category else {
            return;
        };
        let bump = |v: &mut usize| {
            if up {
                *v += 1;
            } else {
                *v = v.saturating_sub(1);
            }
        };
        self.total.send_modify(bump);
        if let Some(counter) = self.categories.get(&category) {
            counter.send_modify(bump);
        }
    }

    fn wait_while_suspended(&self) {
        let mut suspended = self.suspended.lock();
        if *suspended {
            info!("Event queue suspended");
            while *suspended {
                self.resumed.wait(&mut suspended);
            }
            info!("Event queue resumed");
        }
    }

    fn dispatch(&self, manager: &SyncEventManager, event: SyncEvent) {
        let result = catch_unwind(AssertUnwindSafe(|| manager.handle(&event)));
        match result {
            Ok(Ok(Outcome::Consumed)) => {}
            Ok(Ok(Outcome::Passed)) => {
                if event.logs_debug() {
                    debug!(event = %event, "Sync event was not consumed by any handler");
                }
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(event = %event, error = %e, "Sync event handler failed, event dropped");
            }
            Err(panic) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(event = %event, panic = %message, "Sync event handler panicked, event dropped");
            }
        }
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.adjust_counters(event.category(), false);
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    fn mark_stopped(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.is_stopped.store(true, Ordering::Release);
        self.stopped_signal.notify_all();
    }
}

/// Cloneable producer side of a [`SyncEventQueue`]
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl QueueHandle {
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped.load(Ordering::Acquire)
    }
}

impl EventSink for QueueHandle {
    fn add_event(&self, event: SyncEvent) {
        self.shared.add_event(event);
    }

    fn is_closed(&self) -> bool {
        self.shared.sender.lock().is_none()
    }
}

pub struct SyncEventQueue {
    shared: Arc<Shared>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEventQueue {
    /// Create the queue and start its consumer thread
    pub fn new(manager: Arc<SyncEventManager>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(sender));
        let consumer_shared = Arc::clone(&shared);
        let consumer = thread::Builder::new()
            .name("cmsync-event-queue".to_string())
            .spawn(move || Self::run(consumer_shared, manager, receiver))?;
        Ok(Self {
            shared,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    fn run(
        shared: Arc<Shared>,
        manager: Arc<SyncEventManager>,
        mut receiver: mpsc::UnboundedReceiver<SyncEvent>,
    ) {
        debug!("Event queue consumer started");
        while let Some(event) = receiver.blocking_recv() {
            shared.wait_while_suspended();
            shared.dispatch(&manager, event);
        }
        shared.mark_stopped();
        debug!("Event queue consumer stopped");
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn add_event(&self, event: SyncEvent) {
        self.shared.add_event(event);
    }

    /// Pause dispatch once the event in flight is done
    pub fn suspend(&self) {
        *self.shared.suspended.lock() = true;
    }

    pub fn resume(&self) {
        let mut suspended = self.shared.suspended.lock();
        *suspended = false;
        self.shared.resumed.notify_all();
    }

    pub fn is_suspended(&self) -> bool {
        *self.shared.suspended.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped.load(Ordering::Acquire)
    }

    /// True when nothing is queued or in flight
    pub fn is_empty(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire) == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.shared.pending.load(Ordering::Acquire),
            dispatched: self.shared.dispatched.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting events. Queued events are still dispatched, then the
    /// consumer exits. A suspended queue is resumed so the drain can finish.
    pub fn stop_listener(&self) {
        if self.shared.sender.lock().take().is_some() {
            info!("Event queue closed for adding");
        }
        self.resume();
    }

    /// Block until the consumer exited; false on timeout
    pub fn wait_for_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.shared.stopped.lock();
        while !*stopped {
            if self
                .shared
                .stopped_signal
                .wait_until(&mut stopped, deadline)
                .timed_out()
            {
                return *stopped;
            }
        }
        true
    }

    /// In-flight count over all counted categories
    pub fn watch_total(&self) -> watch::Receiver<usize> {
        self.shared.total.subscribe()
    }

    pub fn watch_category(&self, category: EventCategory) -> Option<watch::Receiver<usize>> {
        self.shared.categories.get(&category).map(|c| c.subscribe())
    }
}

impl EventSink for SyncEventQueue {
    fn add_event(&self, event: SyncEvent) {
        self.shared.add_event(event);
    }

    fn is_closed(&self) -> bool {
        self.shared.sender.lock().is_none()
    }
}

impl Drop for SyncEventQueue {
    fn drop(&mut self) {
        self.stop_listener();
        if let Some(consumer) = self.consumer.lock().take() {
            if consumer.thread().id() != thread::current().id() && consumer.join().is_err() {
                error!("Event queue consumer thread panicked");
            }
        }
    }
}
