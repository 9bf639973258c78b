//! Index-addressed snapshot of the stored records for one reconciliation pass.
//!
//! The snapshot is built once per pass and validated on load: duplicate ids,
//! duplicate GUIDs, missing or multiple roots, dangling parents and cycles all
//! fail the pass. Classifiers never mutate it; each owns a
//! [`ConsumptionTracker`] and marks indices instead of removing records.

use super::{MappedObject, PathMatcher};
use crate::error::StorageError;
use crate::tree::ObjectTree;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct StoredSnapshot {
    /// Records in pre-order, the root first
    objects: Vec<MappedObject>,
    parents: Vec<Option<usize>>,
    by_remote_id: HashMap<String, usize>,
    by_guid: HashMap<Uuid, usize>,
}

impl StoredSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate `objects` and order them parent-first
    pub fn from_objects(objects: Vec<MappedObject>) -> Result<Self, StorageError> {
        if objects.is_empty() {
            return Ok(Self::empty());
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(objects.len());
        let mut guids: HashMap<Uuid, usize> = HashMap::with_capacity(objects.len());
        let mut root = None;
        for (i, object) in objects.iter().enumerate() {
            object.validate()?;
            if index.insert(object.remote_object_id.as_str(), i).is_some() {
                return Err(StorageError::InconsistentStructure(format!(
                    "remote object id {} is stored twice",
                    object.remote_object_id
                )));
            }
            if guids.insert(object.guid, i).is_some() {
                return Err(StorageError::InconsistentStructure(format!(
                    "guid {} is stored twice",
                    object.guid
                )));
            }
            if object.is_root() {
                if let Some(other) = root.replace(i) {
                    let other: &MappedObject = &objects[other];
                    return Err(StorageError::InconsistentStructure(format!(
                        "both {} and {} have no parent",
                        other.remote_object_id, object.remote_object_id
                    )));
                }
            }
        }
        let root = root.ok_or_else(|| {
            StorageError::InconsistentStructure("no stored object without parent".to_string())
        })?;

        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, object) in objects.iter().enumerate() {
            if let Some(parent_id) = &object.parent_id {
                let parent = *index.get(parent_id.as_str()).ok_or_else(|| {
                    StorageError::InconsistentStructure(format!(
                        "parent {} of {} does not exist",
                        parent_id, object.remote_object_id
                    ))
                })?;
                children.entry(parent).or_default().push(i);
            }
        }

        // Pre-order walk from the root; anything not reached sits on a cycle.
        let mut order = Vec::with_capacity(objects.len());
        let mut parent_of_old: Vec<Option<usize>> = vec![None; objects.len()];
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            order.push(i);
            if let Some(kids) = children.get(&i) {
                for &kid in kids.iter().rev() {
                    parent_of_old[kid] = Some(i);
                    stack.push(kid);
                }
            }
        }
        if order.len() != objects.len() {
            return Err(StorageError::InconsistentStructure(format!(
                "{} stored objects are not reachable from the root",
                objects.len() - order.len()
            )));
        }

        let mut new_pos = vec![0usize; objects.len()];
        for (pos, &old) in order.iter().enumerate() {
            new_pos[old] = pos;
        }
        let parents = order
            .iter()
            .map(|&old| parent_of_old[old].map(|p| new_pos[p]))
            .collect();

        let mut slots: Vec<Option<MappedObject>> = objects.into_iter().map(Some).collect();
        let objects: Vec<MappedObject> = order
            .iter()
            .filter_map(|&old| slots[old].take())
            .collect();
        let by_remote_id = objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.remote_object_id.clone(), i))
            .collect();
        let by_guid = objects.iter().enumerate().map(|(i, o)| (o.guid, i)).collect();

        Ok(Self {
            objects,
            parents,
            by_remote_id,
            by_guid,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[MappedObject] {
        &self.objects
    }

    pub fn get(&self, idx: usize) -> &MappedObject {
        &self.objects[idx]
    }

    /// Index of the root record
    pub fn root(&self) -> Option<usize> {
        if self.objects.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parents[idx]
    }

    pub fn find_by_remote_id(&self, id: &str) -> Option<usize> {
        self.by_remote_id.get(id).copied()
    }

    pub fn find_by_guid(&self, guid: Uuid) -> Option<usize> {
        self.by_guid.get(&guid).copied()
    }

    /// Names from below the root down to `idx`
    pub fn relative_names(&self, idx: usize) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = idx;
        while let Some(parent) = self.parents[current] {
            names.push(self.objects[current].name.as_str());
            current = parent;
        }
        names.reverse();
        names
    }

    pub fn local_path(&self, idx: usize, matcher: &PathMatcher) -> PathBuf {
        matcher.local_path(&self.relative_names(idx))
    }

    pub fn remote_path(&self, idx: usize, matcher: &PathMatcher) -> String {
        matcher.remote_path(&self.relative_names(idx))
    }

    /// A fresh tracker with nothing consumed
    pub fn tracker(&self) -> ConsumptionTracker {
        ConsumptionTracker {
            consumed: vec![false; self.objects.len()],
        }
    }

    /// Rebuild the ownership tree
    pub fn into_tree(self) -> Option<ObjectTree<MappedObject>> {
        if self.objects.is_empty() {
            return None;
        }
        let mut child_lists: Vec<Vec<usize>> = vec![Vec::new(); self.objects.len()];
        for (i, parent) in self.parents.iter().enumerate() {
            if let Some(p) = parent {
                child_lists[*p].push(i);
            }
        }
        let mut slots: Vec<Option<MappedObject>> = self.objects.into_iter().map(Some).collect();
        Some(build_subtree(0, &child_lists, &mut slots))
    }
}

fn build_subtree(
    idx: usize,
    child_lists: &[Vec<usize>],
    slots: &mut [Option<MappedObject>],
) -> ObjectTree<MappedObject> {
    let children = child_lists[idx]
        .iter()
        .map(|&c| build_subtree(c, child_lists, slots))
        .collect();
    // Every index is visited exactly once in a validated snapshot.
    let item = slots[idx].take().unwrap_or_else(|| unreachable!("snapshot index {idx} visited twice"));
    ObjectTree::with_children(item, children)
}

/// Per-classifier record of which stored objects were matched
#[derive(Debug, Clone)]
pub struct ConsumptionTracker {
    consumed: Vec<bool>,
}

impl ConsumptionTracker {
    /// Mark `idx` consumed; false when it already was
    pub fn consume(&mut self, idx: usize) -> bool {
        !std::mem::replace(&mut self.consumed[idx], true)
    }

    pub fn is_consumed(&self, idx: usize) -> bool {
        self.consumed[idx]
    }

    /// Indices never matched, in snapshot order
    pub fn remaining(&self) -> Vec<usize> {
        self.consumed
            .iter()
            .enumerate()
            .filter(|(_, consumed)| !**consumed)
            .map(|(i, _)| i)
            .collect()
    }
}
