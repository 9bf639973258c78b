//! Remote Event Generator
//!
//! Walks the live remote tree against the stored snapshot, correlating by
//! remote object id and detecting metadata changes through change tokens.

use super::{correlation::CorrelationMap, Classification};
use crate::events::{AbstractFolderEvent, ContentChangeType, MetaDataChangeType};
use crate::remote::{RemoteObject, RemoteRepository};
use crate::store::{ConsumptionTracker, MappedObject, PathMatcher, StoredSnapshot};
use crate::tree::ObjectTree;
use crate::types::{names_equal, ObjectKind};
use tracing::{debug, trace, warn};

pub struct RemoteEventGenerator<'a> {
    repository: &'a dyn RemoteRepository,
    snapshot: &'a StoredSnapshot,
    matcher: &'a PathMatcher,
    tracker: ConsumptionTracker,
    created: Vec<AbstractFolderEvent>,
}

impl<'a> RemoteEventGenerator<'a> {
    pub fn new(
        repository: &'a dyn RemoteRepository,
        snapshot: &'a StoredSnapshot,
        matcher: &'a PathMatcher,
    ) -> Self {
        Self {
            repository,
            snapshot,
            matcher,
            tracker: snapshot.tracker(),
            created: Vec::new(),
        }
    }

    pub fn generate(
        mut self,
        tree: &ObjectTree<RemoteObject>,
        map: &mut CorrelationMap,
    ) -> Classification {
        if let Some(root) = self.snapshot.root() {
            self.tracker.consume(root);
        }
        for child in &tree.children {
            self.walk(child, &tree.item.id, map);
        }
        let deletions = self.tracker.remaining();
        debug!(
            created = self.created.len(),
            deletion_candidates = deletions.len(),
            "Remote classification finished"
        );
        Classification {
            created: self.created,
            deletions,
        }
    }

    fn walk(&mut self, node: &ObjectTree<RemoteObject>, parent_id: &str, map: &mut CorrelationMap) {
        let object = &node.item;
        let matched = self
            .snapshot
            .find_by_remote_id(&object.id)
            .filter(|&idx| self.snapshot.get(idx).kind == object.kind)
            .filter(|&idx| self.tracker.consume(idx));

        match matched {
            Some(idx) => {
                let event = self.classify(object, idx, parent_id);
                trace!(event = %event, "Remote object classified");
                map.insert_remote(&object.id, event);
            }
            None => {
                let mut event = AbstractFolderEvent::new(object.kind);
                let change = event.change_mut();
                change.remote = MetaDataChangeType::Created;
                change.remote_object = Some(object.clone());
                trace!(remote_id = %object.id, name = %object.name, "Remote object created");
                self.created.push(event);
            }
        }

        for child in &node.children {
            self.walk(child, &object.id, map);
        }
    }

    fn classify(&self, object: &RemoteObject, idx: usize, parent_id: &str) -> AbstractFolderEvent {
        let stored = self.snapshot.get(idx);
        let moved = stored.parent_id.as_deref() != Some(parent_id);

        let mut event = AbstractFolderEvent::new(stored.kind);
        let change = event.change_mut();
        change.remote = if moved {
            MetaDataChangeType::Moved
        } else if !names_equal(&stored.name, &object.name) {
            MetaDataChangeType::Changed
        } else if stored.last_change_token != object.change_token {
            MetaDataChangeType::Changed
        } else {
            MetaDataChangeType::None
        };
        if moved {
            change.old_remote_path = Some(self.snapshot.remote_path(idx, self.matcher));
        }
        change.remote_object = Some(object.clone());
        change.stored = Some(stored.clone());
        change.stored_local_path = Some(self.snapshot.local_path(idx, self.matcher));

        if stored.kind == ObjectKind::File {
            event.set_remote_content(self.content_change(object, stored));
        }
        event
    }

    fn content_change(&self, object: &RemoteObject, stored: &MappedObject) -> ContentChangeType {
        let (Some(algorithm), Some(expected)) = (&stored.checksum_algorithm, &stored.last_checksum)
        else {
            return ContentChangeType::Changed;
        };
        let listed = object
            .content_hash
            .as_ref()
            .filter(|h| &h.algorithm == algorithm)
            .map(|h| h.digest.clone());
        let actual = match listed {
            Some(digest) => Some(digest),
            None => match self.repository.content_stream_hash(&object.id, algorithm) {
                Ok(digest) => digest,
                Err(e) => {
                    warn!(
                        remote_id = %object.id,
                        error = %e,
                        "Unable to fetch remote content hash, assuming content changed"
                    );
                    None
                }
            },
        };
        match actual {
            Some(actual) if &actual == expected => ContentChangeType::None,
            _ => ContentChangeType::Changed,
        }
    }
}
