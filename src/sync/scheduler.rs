//! Periodic sync trigger.

use crate::events::{EventSink, StartNextSyncEvent, SyncEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Posts a quiet [`StartNextSyncEvent`] every poll interval
pub struct SyncScheduler {
    poll_interval: Duration,
    sink: Arc<dyn EventSink>,
    sync_on_start: bool,
}

impl SyncScheduler {
    pub fn new(poll_interval: Duration, sink: Arc<dyn EventSink>) -> Self {
        Self {
            poll_interval,
            sink,
            sync_on_start: true,
        }
    }

    /// Whether the first request goes out immediately or after one interval
    pub fn with_sync_on_start(mut self, sync_on_start: bool) -> Self {
        self.sync_on_start = sync_on_start;
        self
    }

    /// Start on the current tokio runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            info!(interval_ms = self.poll_interval.as_millis() as u64, "Sync scheduler started");
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !self.sync_on_start {
                // The first tick completes immediately.
                ticker.tick().await;
            }
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.sink.is_closed() {
                            debug!("Event queue closed, stopping scheduler");
                            break;
                        }
                        self.sink
                            .add_event(SyncEvent::StartNextSync(StartNextSyncEvent::new(false).quiet()));
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Sync scheduler stopped");
        });
        SchedulerHandle { shutdown, task }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for its task to finish
    pub async fn stop(self) {
        // The receiver is gone once the task exited on its own.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Sync scheduler task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
