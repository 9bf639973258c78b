//! Reconciliation engine
//!
//! A pass diffs the live local and remote trees against the stored snapshot:
//! both classifiers fill one [`CorrelationMap`], the [`EventMerger`] folds it
//! into one event per object, deletions are resolved across both sides and
//! newly created objects are appended last.

pub mod correlation;
pub mod crawler;
pub mod engine;
pub mod local_generator;
pub mod merger;
pub mod remote_generator;
pub mod scheduler;

pub use correlation::{CorrelationMap, EventPair};
pub use crawler::DescendantsCrawler;
pub use engine::SyncEngine;
pub use local_generator::LocalEventGenerator;
pub use merger::EventMerger;
pub use remote_generator::RemoteEventGenerator;
pub use scheduler::{SchedulerHandle, SyncScheduler};

use crate::events::AbstractFolderEvent;
use crate::fs::LocalFileSystem;
use crate::remote::{RemoteObject, RemoteRepository};
use crate::store::{PathMatcher, StoredSnapshot};
use crate::tree::{LocalEntry, ObjectTree};
use tracing::info;

/// What one classifier leaves behind after its walk
#[derive(Debug, Default)]
pub struct Classification {
    /// Created objects in traversal order
    pub created: Vec<AbstractFolderEvent>,
    /// Snapshot indices the walk never matched, in snapshot order
    pub deletions: Vec<usize>,
}

/// Runs the diff and merge phase of a pass over already built trees
pub struct Reconciler<'a> {
    fs: &'a dyn LocalFileSystem,
    repository: &'a dyn RemoteRepository,
    matcher: &'a PathMatcher,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        fs: &'a dyn LocalFileSystem,
        repository: &'a dyn RemoteRepository,
        matcher: &'a PathMatcher,
    ) -> Self {
        Self {
            fs,
            repository,
            matcher,
        }
    }

    /// Events in publication order: merged, deleted, then created
    pub fn reconcile(
        &self,
        snapshot: &StoredSnapshot,
        local_tree: &ObjectTree<LocalEntry>,
        remote_tree: &ObjectTree<RemoteObject>,
    ) -> Vec<AbstractFolderEvent> {
        let mut map = CorrelationMap::new();
        let local = LocalEventGenerator::new(self.fs, snapshot, self.matcher)
            .generate(local_tree, &mut map);
        let remote = RemoteEventGenerator::new(self.repository, snapshot, self.matcher)
            .generate(remote_tree, &mut map);

        let merger = EventMerger::new(snapshot, self.matcher);
        let mut events = merger.merge(map);
        let merged = events.len();
        events.extend(merger.deletions(&local.deletions, &remote.deletions));
        let deleted = events.len() - merged;
        let created = local.created.len() + remote.created.len();
        events.extend(local.created);
        events.extend(remote.created);

        info!(merged, deleted, created, "Reconciliation finished");
        events
    }
}
