//! Remote tree acquisition

use super::ObjectTree;
use crate::error::SyncError;
use crate::filter::{FilterAggregator, FilterDecision};
use crate::remote::{RemoteObject, RemoteRepository};
use crate::store::{IgnoredEntitiesStorage, IgnoredEntity};
use crate::types::ObjectKind;
use tracing::{debug, error, info, trace};

/// Builds the filtered remote tree below a root folder.
///
/// A folder whose children are all filtered out is recorded in the
/// ignored-entities store and kept as a childless leaf; the record is dropped
/// again as soon as one of its children passes the filters. The root is
/// listed level by level: a recorded folder only costs a listing of its
/// direct children, every other folder is fetched with one descendants call.
pub struct RemoteTreeBuilder<'a> {
    repository: &'a dyn RemoteRepository,
    filters: &'a dyn FilterAggregator,
    ignored: &'a dyn IgnoredEntitiesStorage,
}

impl<'a> RemoteTreeBuilder<'a> {
    pub fn new(
        repository: &'a dyn RemoteRepository,
        filters: &'a dyn FilterAggregator,
        ignored: &'a dyn IgnoredEntitiesStorage,
    ) -> Self {
        Self {
            repository,
            filters,
            ignored,
        }
    }

    pub fn build(&self, root_id: &str) -> Result<ObjectTree<RemoteObject>, SyncError> {
        let root = self.repository.get_object(root_id).map_err(|e| {
            error!(root_id, error = %e, "Failed to fetch remote root");
            e
        })?;
        let listing = self.list_children(root_id)?;
        let children = self.visit_listing(listing)?;
        Ok(ObjectTree::with_children(root, children))
    }

    fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>, SyncError> {
        self.repository.get_children(folder_id).map_err(|e| {
            error!(folder_id, error = %e, "Failed to list remote folder");
            e
        })
    }

    fn visit_listing(
        &self,
        listing: Vec<RemoteObject>,
    ) -> Result<Vec<ObjectTree<RemoteObject>>, SyncError> {
        let mut kept = Vec::with_capacity(listing.len());
        for object in listing {
            if let Some(node) = self.visit(object)? {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn visit(&self, object: RemoteObject) -> Result<Option<ObjectTree<RemoteObject>>, SyncError> {
        if self.rejected(&object) {
            return Ok(None);
        }
        if object.kind == ObjectKind::File {
            return Ok(Some(ObjectTree::leaf(object)));
        }

        if self.ignored.is_ignored_id(&object.id)? {
            let listing = self.list_children(&object.id)?;
            if !listing.iter().any(|child| self.accepts(child)) {
                trace!(remote_id = %object.id, "Remote folder is still fully ignored");
                return Ok(Some(ObjectTree::leaf(object)));
            }
            info!(remote_id = %object.id, name = %object.name, "Remote folder is no longer ignored");
            self.ignored.remove(&object.id)?;
            let children = self.visit_listing(listing)?;
            return Ok(Some(ObjectTree::with_children(object, children)));
        }

        let descendants = self.repository.get_descendants(&object.id).map_err(|e| {
            error!(folder_id = %object.id, error = %e, "Failed to list remote descendants");
            e
        })?;
        self.collapse(object, descendants).map(Some)
    }

    fn filter_children(
        &self,
        nodes: Vec<ObjectTree<RemoteObject>>,
    ) -> Result<Vec<ObjectTree<RemoteObject>>, SyncError> {
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if self.rejected(&node.item) {
                continue;
            }
            let ObjectTree { item, children } = node;
            if item.kind == ObjectKind::File {
                kept.push(ObjectTree::leaf(item));
            } else {
                kept.push(self.collapse(item, children)?);
            }
        }
        Ok(kept)
    }

    /// Filter a listed folder's subtree and keep the ignored record in step
    fn collapse(
        &self,
        item: RemoteObject,
        children: Vec<ObjectTree<RemoteObject>>,
    ) -> Result<ObjectTree<RemoteObject>, SyncError> {
        let had_children = !children.is_empty();
        let kept = self.filter_children(children)?;

        if had_children && kept.is_empty() {
            if !self.ignored.is_ignored_id(&item.id)? {
                info!(remote_id = %item.id, name = %item.name, "Remote folder is fully ignored");
                self.ignored.add(IgnoredEntity {
                    object_id: item.id.clone(),
                    local_path: None,
                })?;
            }
        } else if !kept.is_empty() && self.ignored.is_ignored_id(&item.id)? {
            info!(remote_id = %item.id, name = %item.name, "Remote folder is no longer ignored");
            self.ignored.remove(&item.id)?;
        }

        Ok(ObjectTree::with_children(item, kept))
    }

    fn decision(&self, object: &RemoteObject) -> FilterDecision {
        match object.kind {
            ObjectKind::Folder => self.filters.check_folder(&object.name),
            ObjectKind::File => self.filters.check_file_name(&object.name),
        }
    }

    fn accepts(&self, object: &RemoteObject) -> bool {
        !self.decision(object).is_rejected()
    }

    fn rejected(&self, object: &RemoteObject) -> bool {
        match self.decision(object) {
            FilterDecision::Accept => false,
            FilterDecision::Reject(reason) => {
                debug!(
                    remote_id = %object.id,
                    name = %object.name,
                    reason = %reason,
                    "Skipping filtered remote object"
                );
                true
            }
        }
    }
}
