//! Local Event Generator
//!
//! Walks the live local tree against the stored snapshot. Identity is the
//! GUID from the entry's extended attribute; entries without a known GUID
//! are reported as created.

use super::{correlation::CorrelationMap, Classification};
use crate::events::{AbstractFolderEvent, ContentChangeType, MetaDataChangeType};
use crate::fs::LocalFileSystem;
use crate::store::{ConsumptionTracker, MappedObject, PathMatcher, StoredSnapshot};
use crate::tree::{LocalEntry, ObjectTree};
use crate::types::{names_equal, ObjectKind};
use tracing::{debug, trace};

pub struct LocalEventGenerator<'a> {
    fs: &'a dyn LocalFileSystem,
    snapshot: &'a StoredSnapshot,
    matcher: &'a PathMatcher,
    tracker: ConsumptionTracker,
    created: Vec<AbstractFolderEvent>,
}

impl<'a> LocalEventGenerator<'a> {
    pub fn new(
        fs: &'a dyn LocalFileSystem,
        snapshot: &'a StoredSnapshot,
        matcher: &'a PathMatcher,
    ) -> Self {
        Self {
            fs,
            snapshot,
            matcher,
            tracker: snapshot.tracker(),
            created: Vec::new(),
        }
    }

    /// Classify every entry below `tree`'s root.
    ///
    /// Matched entries go into `map`; created entries and the unmatched
    /// stored records come back in the [`Classification`].
    pub fn generate(
        mut self,
        tree: &ObjectTree<LocalEntry>,
        map: &mut CorrelationMap,
    ) -> Classification {
        let root = self.snapshot.root();
        if let Some(root) = root {
            self.tracker.consume(root);
        }
        for child in &tree.children {
            self.walk(child, root, map);
        }
        let deletions = self.tracker.remaining();
        debug!(
            created = self.created.len(),
            deletion_candidates = deletions.len(),
            "Local classification finished"
        );
        Classification {
            created: self.created,
            deletions,
        }
    }

    fn walk(
        &mut self,
        node: &ObjectTree<LocalEntry>,
        parent: Option<usize>,
        map: &mut CorrelationMap,
    ) {
        let entry = &node.item;
        let matched = entry
            .guid
            .and_then(|guid| self.snapshot.find_by_guid(guid))
            .filter(|&idx| self.snapshot.get(idx).kind == entry.kind)
            .filter(|&idx| self.tracker.consume(idx));

        let next_parent = match matched {
            Some(idx) => {
                let event = self.classify(entry, idx, parent);
                trace!(event = %event, "Local object classified");
                let remote_id = self.snapshot.get(idx).remote_object_id.clone();
                map.insert_local(&remote_id, event);
                Some(idx)
            }
            None => {
                let mut event = AbstractFolderEvent::new(entry.kind);
                let change = event.change_mut();
                change.local = MetaDataChangeType::Created;
                change.local_entry = Some(entry.clone());
                trace!(path = %entry.path.display(), "Local object created");
                self.created.push(event);
                None
            }
        };

        for child in &node.children {
            self.walk(child, next_parent, map);
        }
    }

    fn classify(
        &self,
        entry: &LocalEntry,
        idx: usize,
        parent: Option<usize>,
    ) -> AbstractFolderEvent {
        let stored = self.snapshot.get(idx);
        let live_parent_id = parent.map(|p| self.snapshot.get(p).remote_object_id.as_str());
        let stored_path = self.snapshot.local_path(idx, self.matcher);

        let moved = stored.parent_id.as_deref() != live_parent_id;

        let mut event = AbstractFolderEvent::new(stored.kind);
        let change = event.change_mut();
        change.local = if moved {
            MetaDataChangeType::Moved
        } else if !names_equal(&stored.name, &entry.name) {
            MetaDataChangeType::Changed
        } else if stored.last_local_write_utc != Some(entry.last_write_utc) {
            MetaDataChangeType::Changed
        } else {
            MetaDataChangeType::None
        };
        if moved {
            change.old_local_path = Some(stored_path.clone());
        }
        change.local_entry = Some(entry.clone());
        change.stored = Some(stored.clone());
        change.stored_local_path = Some(stored_path);

        if stored.kind == ObjectKind::File {
            event.set_local_content(self.content_change(entry, stored));
        }
        event
    }

    fn content_change(&self, entry: &LocalEntry, stored: &MappedObject) -> ContentChangeType {
        let (Some(algorithm), Some(expected)) = (&stored.checksum_algorithm, &stored.last_checksum)
        else {
            return ContentChangeType::Changed;
        };
        match self.fs.content_hash(&entry.path, algorithm) {
            Ok(Some(actual)) if &actual == expected => ContentChangeType::None,
            Ok(Some(_)) => ContentChangeType::Changed,
            Ok(None) => {
                debug!(
                    path = %entry.path.display(),
                    algorithm = %algorithm,
                    "Unsupported checksum algorithm, assuming content changed"
                );
                ContentChangeType::Changed
            }
            Err(e) => {
                debug!(
                    path = %entry.path.display(),
                    error = %e,
                    "Unable to hash local content, assuming content changed"
                );
                ContentChangeType::Changed
            }
        }
    }
}
