//! Event Correlator/Merger
//!
//! Folds the correlation map and both sides' deletion candidates into the
//! events a pass publishes.

use super::correlation::{CorrelationMap, EventPair};
use crate::events::{AbstractFolderEvent, MetaDataChangeType};
use crate::store::{PathMatcher, StoredSnapshot};
use std::collections::HashSet;
use tracing::{debug, trace};

pub struct EventMerger<'a> {
    snapshot: &'a StoredSnapshot,
    matcher: &'a PathMatcher,
}

impl<'a> EventMerger<'a> {
    pub fn new(snapshot: &'a StoredSnapshot, matcher: &'a PathMatcher) -> Self {
        Self { snapshot, matcher }
    }

    /// One event per correlated object, suppressing pairs with nothing to do
    pub fn merge(&self, map: CorrelationMap) -> Vec<AbstractFolderEvent> {
        let mut out = Vec::new();
        let mut suppressed = 0usize;
        for (remote_id, pair) in map {
            match Self::merge_pair(pair) {
                Some(event) => out.push(event),
                None => {
                    trace!(remote_id = %remote_id, "Nothing to do for object");
                    suppressed += 1;
                }
            }
        }
        debug!(merged = out.len(), suppressed, "Merged correlated events");
        out
    }

    fn merge_pair(pair: EventPair) -> Option<AbstractFolderEvent> {
        match (pair.local, pair.remote) {
            (Some(local), Some(mut merged)) => {
                let local_content = local.local_content();
                let local_change = local.change();
                let change = merged.change_mut();
                change.local = local_change.local;
                change.local_entry = local_change.local_entry.clone();
                change.old_local_path = local_change.old_local_path.clone();
                if change.stored_local_path.is_none() {
                    change.stored_local_path = local_change.stored_local_path.clone();
                }
                merged.set_local_content(local_content);
                (!merged.is_unchanged()).then_some(merged)
            }
            (None, Some(remote)) => (remote.remote() != MetaDataChangeType::None).then_some(remote),
            (Some(local), None) => (local.local() != MetaDataChangeType::None).then_some(local),
            (None, None) => None,
        }
    }

    /// Deletion events: mutual deletes first, then local-only, then
    /// remote-only, each in snapshot order
    pub fn deletions(&self, local: &[usize], remote: &[usize]) -> Vec<AbstractFolderEvent> {
        let remote_set: HashSet<usize> = remote.iter().copied().collect();
        let mutual: HashSet<usize> = local
            .iter()
            .copied()
            .filter(|idx| remote_set.contains(idx))
            .collect();

        let mut out = Vec::with_capacity(local.len() + remote.len() - mutual.len());
        for &idx in local.iter().filter(|idx| mutual.contains(idx)) {
            out.push(self.deleted(idx, MetaDataChangeType::Deleted, MetaDataChangeType::Deleted));
        }
        for &idx in local.iter().filter(|idx| !mutual.contains(idx)) {
            out.push(self.deleted(idx, MetaDataChangeType::Deleted, MetaDataChangeType::None));
        }
        for &idx in remote.iter().filter(|idx| !mutual.contains(idx)) {
            out.push(self.deleted(idx, MetaDataChangeType::None, MetaDataChangeType::Deleted));
        }
        debug!(
            mutual = mutual.len(),
            local_only = local.len() - mutual.len(),
            remote_only = remote.len() - mutual.len(),
            "Resolved deletions"
        );
        out
    }

    fn deleted(
        &self,
        idx: usize,
        local: MetaDataChangeType,
        remote: MetaDataChangeType,
    ) -> AbstractFolderEvent {
        let stored = self.snapshot.get(idx);
        let mut event = AbstractFolderEvent::new(stored.kind);
        let change = event.change_mut();
        change.local = local;
        change.remote = remote;
        change.stored = Some(stored.clone());
        change.stored_local_path = Some(self.snapshot.local_path(idx, self.matcher));
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ContentChangeType;
    use crate::store::MappedObject;
    use crate::types::ObjectKind;

    fn snapshot() -> StoredSnapshot {
        StoredSnapshot::from_objects(vec![
            MappedObject::new("", "root", ObjectKind::Folder, None).unwrap(),
            MappedObject::new("a", "a", ObjectKind::File, Some("root")).unwrap(),
            MappedObject::new("b", "b", ObjectKind::File, Some("root")).unwrap(),
            MappedObject::new("c", "c", ObjectKind::File, Some("root")).unwrap(),
        ])
        .unwrap()
    }

    fn half(local: MetaDataChangeType, remote: MetaDataChangeType) -> AbstractFolderEvent {
        let mut event = AbstractFolderEvent::new(ObjectKind::File);
        event.change_mut().local = local;
        event.change_mut().remote = remote;
        event
    }

    #[test]
    fn test_unchanged_pair_is_suppressed() {
        let snapshot = snapshot();
        let matcher = PathMatcher::new("/l", "/r");
        let mut map = CorrelationMap::new();
        map.insert_local("a", half(MetaDataChangeType::None, MetaDataChangeType::None));
        map.insert_remote("a", half(MetaDataChangeType::None, MetaDataChangeType::None));
        assert!(EventMerger::new(&snapshot, &matcher).merge(map).is_empty());
    }

    #[test]
    fn test_content_change_keeps_pair() {
        let snapshot = snapshot();
        let matcher = PathMatcher::new("/l", "/r");
        let mut map = CorrelationMap::new();
        let mut local = half(MetaDataChangeType::None, MetaDataChangeType::None);
        local.set_local_content(ContentChangeType::Changed);
        map.insert_local("a", local);
        map.insert_remote("a", half(MetaDataChangeType::None, MetaDataChangeType::None));
        let events = EventMerger::new(&snapshot, &matcher).merge(map);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].local_content(), ContentChangeType::Changed);
    }

    #[test]
    fn test_merged_event_carries_both_sides() {
        let snapshot = snapshot();
        let matcher = PathMatcher::new("/l", "/r");
        let mut map = CorrelationMap::new();
        let mut local = half(MetaDataChangeType::Moved, MetaDataChangeType::None);
        local.change_mut().old_local_path = Some("/l/old/a".into());
        map.insert_local("a", local);
        map.insert_remote("a", half(MetaDataChangeType::None, MetaDataChangeType::Changed));
        let events = EventMerger::new(&snapshot, &matcher).merge(map);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].local(), MetaDataChangeType::Moved);
        assert_eq!(events[0].remote(), MetaDataChangeType::Changed);
        assert_eq!(
            events[0].change().old_local_path.as_deref(),
            Some(std::path::Path::new("/l/old/a"))
        );
    }

    #[test]
    fn test_single_halves_need_a_change_on_their_side() {
        let snapshot = snapshot();
        let matcher = PathMatcher::new("/l", "/r");
        let mut map = CorrelationMap::new();
        map.insert_remote("a", half(MetaDataChangeType::None, MetaDataChangeType::None));
        map.insert_remote("b", half(MetaDataChangeType::None, MetaDataChangeType::Changed));
        map.insert_local("c", half(MetaDataChangeType::None, MetaDataChangeType::None));
        let events = EventMerger::new(&snapshot, &matcher).merge(map);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].remote(), MetaDataChangeType::Changed);
    }

    #[test]
    fn test_mutual_deletes_are_collapsed() {
        let snapshot = snapshot();
        let matcher = PathMatcher::new("/l", "/r");
        let merger = EventMerger::new(&snapshot, &matcher);
        let a = snapshot.find_by_remote_id("a").unwrap();
        let b = snapshot.find_by_remote_id("b").unwrap();
        let c = snapshot.find_by_remote_id("c").unwrap();

        let events = merger.deletions(&[a, b], &[b, c]);
        let summary: Vec<(Option<&str>, MetaDataChangeType, MetaDataChangeType)> = events
            .iter()
            .map(|e| (e.remote_id(), e.local(), e.remote()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some("b"), MetaDataChangeType::Deleted, MetaDataChangeType::Deleted),
                (Some("a"), MetaDataChangeType::Deleted, MetaDataChangeType::None),
                (Some("c"), MetaDataChangeType::None, MetaDataChangeType::Deleted),
            ]
        );
        assert_eq!(
            events[1].change().stored_local_path.as_deref(),
            Some(std::path::Path::new("/l/a"))
        );
    }
}
