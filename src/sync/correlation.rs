//! Pass-scoped correlation of local and remote classifications.

use crate::events::AbstractFolderEvent;
use std::collections::HashMap;

/// The two halves recorded for one remote object id
#[derive(Debug, Clone, Default)]
pub struct EventPair {
    pub local: Option<AbstractFolderEvent>,
    pub remote: Option<AbstractFolderEvent>,
}

/// Map from remote object id to its [`EventPair`].
///
/// Iteration follows first insertion, so a pass publishes merged events in
/// the order the local walk met them, followed by objects only the remote
/// walk reported.
#[derive(Debug, Default)]
pub struct CorrelationMap {
    entries: Vec<(String, EventPair)>,
    index: HashMap<String, usize>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&mut self, remote_id: &str) -> &mut EventPair {
        let idx = match self.index.get(remote_id) {
            Some(&idx) => idx,
            None => {
                self.entries.push((remote_id.to_string(), EventPair::default()));
                self.index
                    .insert(remote_id.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    /// Record the local half; returns the half it replaced, if any
    pub fn insert_local(
        &mut self,
        remote_id: &str,
        event: AbstractFolderEvent,
    ) -> Option<AbstractFolderEvent> {
        self.slot(remote_id).local.replace(event)
    }

    pub fn insert_remote(
        &mut self,
        remote_id: &str,
        event: AbstractFolderEvent,
    ) -> Option<AbstractFolderEvent> {
        self.slot(remote_id).remote.replace(event)
    }

    pub fn get(&self, remote_id: &str) -> Option<&EventPair> {
        self.index.get(remote_id).map(|&idx| &self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventPair)> {
        self.entries.iter().map(|(id, pair)| (id.as_str(), pair))
    }
}

impl IntoIterator for CorrelationMap {
    type Item = (String, EventPair);
    type IntoIter = std::vec::IntoIter<(String, EventPair)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
