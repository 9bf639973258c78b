//! Descendants Crawler
//!
//! The event handler that runs a reconciliation pass whenever a
//! [`StartNextSyncEvent`] arrives. The three trees are built in parallel; the
//! pass publishes nothing unless all three builds succeed.
//!
//! Requests are ignored from the start of a pass until its
//! [`FullSyncCompletedEvent`] comes back through the bus. A pass that fails
//! or panics releases the flag right away, so the next request retries.

use super::Reconciler;
use crate::error::SyncError;
use crate::events::{
    AbstractFolderEvent, EventSink, FullSyncCompletedEvent, Outcome, StartNextSyncEvent,
    SyncEvent, SyncEventHandler,
};
use crate::filter::FilterAggregator;
use crate::fs::LocalFileSystem;
use crate::remote::RemoteRepository;
use crate::store::{IgnoredEntitiesStorage, MetaDataStorage, StoredSnapshot};
use crate::tree::{LocalTreeBuilder, RemoteTreeBuilder};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct DescendantsCrawler {
    local_root: PathBuf,
    remote_root_id: String,
    fs: Arc<dyn LocalFileSystem>,
    repository: Arc<dyn RemoteRepository>,
    storage: Arc<dyn MetaDataStorage>,
    ignored: Arc<dyn IgnoredEntitiesStorage>,
    filters: Arc<dyn FilterAggregator>,
    sink: Arc<dyn EventSink>,
    /// Set from the start of a pass until its completion event comes back
    busy: AtomicBool,
}

impl DescendantsCrawler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_root: impl Into<PathBuf>,
        remote_root_id: impl Into<String>,
        fs: Arc<dyn LocalFileSystem>,
        repository: Arc<dyn RemoteRepository>,
        storage: Arc<dyn MetaDataStorage>,
        ignored: Arc<dyn IgnoredEntitiesStorage>,
        filters: Arc<dyn FilterAggregator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root_id: remote_root_id.into(),
            fs,
            repository,
            storage,
            ignored,
            filters,
            sink,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Build the trees and compute the events of one pass without
    /// publishing them
    pub fn crawl(&self) -> Result<Vec<AbstractFolderEvent>, SyncError> {
        let started = Instant::now();
        let (local, remote, snapshot) = thread::scope(|scope| {
            let local = scope.spawn(|| {
                LocalTreeBuilder::new(self.fs.as_ref(), self.filters.as_ref())
                    .build(&self.local_root)
            });
            let remote = scope.spawn(|| {
                RemoteTreeBuilder::new(
                    self.repository.as_ref(),
                    self.filters.as_ref(),
                    self.ignored.as_ref(),
                )
                .build(&self.remote_root_id)
            });
            let snapshot = scope.spawn(|| -> Result<StoredSnapshot, SyncError> {
                let objects = self.storage.get_object_list()?;
                Ok(StoredSnapshot::from_objects(objects)?)
            });
            (join(local), join(remote), join(snapshot))
        });
        let local = local?;
        let remote = remote?;
        let snapshot = snapshot.map_err(|e| {
            error!(error = %e, "Stored snapshot is inconsistent, aborting pass");
            e
        })?;
        debug!(
            local = local.len(),
            remote = remote.len(),
            stored = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Trees built"
        );

        let matcher = self.storage.path_matcher();
        Ok(Reconciler::new(self.fs.as_ref(), self.repository.as_ref(), matcher)
            .reconcile(&snapshot, &local, &remote))
    }

    fn run_pass(&self, start: &StartNextSyncEvent) -> Result<(), SyncError> {
        info!(full_sync = start.full_sync_requested, "Starting reconciliation pass");
        let events = self.crawl()?;
        let published = events.len();
        for event in events {
            self.sink.add_event(SyncEvent::Object(event));
        }
        self.sink
            .add_event(SyncEvent::FullSyncCompleted(FullSyncCompletedEvent {
                start: start.clone(),
                events_published: published,
            }));
        info!(published, "Reconciliation pass published");
        Ok(())
    }
}

/// Clears the busy flag when a pass ends without publishing its completion
/// event, whether it returned an error or unwound.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    armed: bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if thread::panicking() {
            warn!("Reconciliation pass panicked, the next sync request starts over");
        }
        self.busy.store(false, Ordering::Release);
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

impl SyncEventHandler for DescendantsCrawler {
    fn name(&self) -> &str {
        "descendants-crawler"
    }

    fn handle(&self, event: &SyncEvent) -> Result<Outcome, SyncError> {
        match event {
            SyncEvent::StartNextSync(start) => {
                if self.busy.swap(true, Ordering::AcqRel) {
                    debug!("Reconciliation pass in flight, ignoring sync request");
                    return Ok(Outcome::Consumed);
                }
                let mut guard = BusyGuard {
                    busy: &self.busy,
                    armed: true,
                };
                self.run_pass(start)?;
                // The completion event now owns the flag.
                guard.armed = false;
                Ok(Outcome::Consumed)
            }
            SyncEvent::FullSyncCompleted(done) => {
                self.busy.store(false, Ordering::Release);
                debug!(published = done.events_published, "Reconciliation pass drained");
                Ok(Outcome::Passed)
            }
            SyncEvent::Object(_) => Ok(Outcome::Passed),
        }
    }
}
