//! Mapped Object Store
//!
//! Persisted correlation between local paths and remote objects, with the
//! metadata last seen on each side. The reconciliation engine only reads
//! from it; records are written by the appliers once an event is handled.

pub mod ignored;
pub mod path_matcher;
pub mod persistence;
pub mod snapshot;

use crate::error::StorageError;
use crate::tree::ObjectTree;
use crate::types::{ObjectKind, RemoteIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub use ignored::{IgnoredEntitiesStorage, IgnoredEntity, InMemoryIgnoredEntities, SledIgnoredEntitiesStorage};
pub use path_matcher::PathMatcher;
pub use persistence::SledMetaDataStorage;
pub use snapshot::{ConsumptionTracker, StoredSnapshot};

/// MappedObject: one previously synchronized object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedObject {
    /// Local identity, persisted as filesystem metadata
    pub guid: Uuid,
    pub remote_object_id: String,
    /// Remote id of the parent; `None` only for the sync root
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: ObjectKind,
    pub last_local_write_utc: Option<DateTime<Utc>>,
    pub last_change_token: Option<String>,
    pub last_checksum: Option<Vec<u8>>,
    pub checksum_algorithm: Option<String>,
    pub last_stored_utc: Option<DateTime<Utc>>,
}

impl MappedObject {
    /// Create a record with a fresh GUID
    pub fn new(
        name: impl Into<String>,
        remote_object_id: impl Into<String>,
        kind: ObjectKind,
        parent_id: Option<&str>,
    ) -> Result<Self, StorageError> {
        let object = Self {
            guid: Uuid::new_v4(),
            remote_object_id: remote_object_id.into(),
            parent_id: parent_id.map(str::to_string),
            name: name.into(),
            kind,
            last_local_write_utc: None,
            last_change_token: None,
            last_checksum: None,
            checksum_algorithm: None,
            last_stored_utc: None,
        };
        object.validate()?;
        Ok(object)
    }

    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = guid;
        self
    }

    pub fn with_change_token(mut self, token: impl Into<String>) -> Self {
        self.last_change_token = Some(token.into());
        self
    }

    pub fn with_local_write(mut self, at: DateTime<Utc>) -> Self {
        self.last_local_write_utc = Some(at);
        self
    }

    pub fn with_checksum(mut self, algorithm: impl Into<String>, digest: Vec<u8>) -> Self {
        self.checksum_algorithm = Some(algorithm.into());
        self.last_checksum = Some(digest);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn remote_identity(&self) -> RemoteIdentity {
        RemoteIdentity::new(self.remote_object_id.clone())
    }

    /// Check the record-level preconditions
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.remote_object_id.is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "object {:?} has no remote object id",
                self.name
            )));
        }
        if self.name.is_empty() && !self.is_root() {
            return Err(StorageError::InvalidRecord(format!(
                "object {} has an empty name",
                self.remote_object_id
            )));
        }
        if self.parent_id.as_deref() == Some(self.remote_object_id.as_str()) {
            return Err(StorageError::InvalidRecord(format!(
                "object {} is its own parent",
                self.remote_object_id
            )));
        }
        Ok(())
    }
}

/// MetaDataStorage: the persisted mapping between both sides
pub trait MetaDataStorage: Send + Sync {
    /// All stored records; empty when nothing was synchronized yet
    fn get_object_list(&self) -> Result<Vec<MappedObject>, StorageError>;
    fn get_object_by_remote_id(&self, id: &str) -> Result<Option<MappedObject>, StorageError>;
    fn get_object_by_guid(&self, guid: Uuid) -> Result<Option<MappedObject>, StorageError>;
    fn save_mapped_object(&self, object: &MappedObject) -> Result<(), StorageError>;
    /// Remove the object and everything stored below it
    fn remove_object(&self, object: &MappedObject) -> Result<(), StorageError>;
    fn path_matcher(&self) -> &PathMatcher;

    /// Stored records as a tree rooted at the record without parent
    fn get_object_tree(&self) -> Result<Option<ObjectTree<MappedObject>>, StorageError> {
        Ok(StoredSnapshot::from_objects(self.get_object_list()?)?.into_tree())
    }

    /// Local path of a stored record, `None` when its parent chain is broken
    fn get_local_path(&self, object: &MappedObject) -> Result<Option<PathBuf>, StorageError> {
        Ok(self
            .relative_names(object)?
            .map(|names| self.path_matcher().local_path(&names)))
    }

    fn get_remote_path(&self, object: &MappedObject) -> Result<String, StorageError> {
        let names = self.relative_names(object)?.ok_or_else(|| {
            StorageError::InconsistentStructure(format!(
                "parent chain of {} is broken",
                object.remote_object_id
            ))
        })?;
        Ok(self.path_matcher().remote_path(&names))
    }

    /// Names from below the root down to `object`
    fn relative_names(&self, object: &MappedObject) -> Result<Option<Vec<String>>, StorageError> {
        let mut names = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut current = object.clone();
        while let Some(parent_id) = current.parent_id.clone() {
            names.push(current.name.clone());
            if !visited.insert(parent_id.clone()) {
                return Err(StorageError::InconsistentStructure(format!(
                    "parent cycle detected at {}",
                    object.remote_object_id
                )));
            }
            current = match self.get_object_by_remote_id(&parent_id)? {
                Some(parent) => parent,
                None => return Ok(None),
            };
        }
        names.reverse();
        Ok(Some(names))
    }

    /// Check every structural invariant of the stored records
    fn validate_object_structure(&self) -> Result<(), StorageError> {
        StoredSnapshot::from_objects(self.get_object_list()?).map(|_| ())
    }
}
