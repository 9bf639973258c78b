//! Remote repository accessor contract.
//!
//! The wire protocol client lives outside this crate; the engine only needs
//! the read operations below.

use crate::error::SyncError;
use crate::tree::ObjectTree;
use crate::types::{ContentHash, ObjectKind, RemoteIdentity};

/// A node of the remote repository as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    /// Parent folder id; `None` for the repository root or unfiled objects
    pub parent_id: Option<String>,
    pub kind: ObjectKind,
    pub change_token: Option<String>,
    /// Content stream hash, documents only
    pub content_hash: Option<ContentHash>,
}

impl RemoteObject {
    pub fn folder(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: parent_id.map(str::to_string),
            kind: ObjectKind::Folder,
            change_token: None,
            content_hash: None,
        }
    }

    pub fn document(id: impl Into<String>, name: impl Into<String>, parent_id: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: Some(parent_id.to_string()),
            kind: ObjectKind::File,
            change_token: None,
            content_hash: None,
        }
    }

    pub fn with_change_token(mut self, token: impl Into<String>) -> Self {
        self.change_token = Some(token.into());
        self
    }

    pub fn with_content_hash(mut self, hash: ContentHash) -> Self {
        self.content_hash = Some(hash);
        self
    }

    pub fn identity(&self) -> RemoteIdentity {
        RemoteIdentity::new(self.id.clone())
    }
}

/// Read access to the remote repository
pub trait RemoteRepository: Send + Sync {
    fn get_object(&self, id: &str) -> Result<RemoteObject, SyncError>;

    /// Direct children of a folder
    fn get_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>, SyncError>;

    /// Full descendant subtree of a folder, one tree per direct child.
    ///
    /// Repositories with a native descendants call should override this; the
    /// default walks [`RemoteRepository::get_children`] recursively.
    fn get_descendants(&self, folder_id: &str) -> Result<Vec<ObjectTree<RemoteObject>>, SyncError> {
        let mut out = Vec::new();
        for child in self.get_children(folder_id)? {
            let children = if child.kind.is_folder() {
                self.get_descendants(&child.id)?
            } else {
                Vec::new()
            };
            out.push(ObjectTree::with_children(child, children));
        }
        Ok(out)
    }

    /// Hash of the content stream computed with `algorithm`, if the
    /// repository can provide one
    fn content_stream_hash(&self, _id: &str, _algorithm: &str) -> Result<Option<Vec<u8>>, SyncError> {
        Ok(None)
    }
}
