//! Records of remote folders whose whole subtree is filtered out.

use crate::error::StorageError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const IGNORED_TREE: &str = "ignored_entities";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredEntity {
    pub object_id: String,
    pub local_path: Option<PathBuf>,
}

pub trait IgnoredEntitiesStorage: Send + Sync {
    fn add(&self, entity: IgnoredEntity) -> Result<(), StorageError>;
    fn remove(&self, object_id: &str) -> Result<(), StorageError>;
    fn is_ignored_id(&self, object_id: &str) -> Result<bool, StorageError>;
}

/// Ignored-entity records kept in a sled tree
pub struct SledIgnoredEntitiesStorage {
    tree: sled::Tree,
}

impl SledIgnoredEntitiesStorage {
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(IGNORED_TREE)?,
        })
    }

    pub fn list(&self) -> Result<Vec<IgnoredEntity>, StorageError> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }
}

impl IgnoredEntitiesStorage for SledIgnoredEntitiesStorage {
    fn add(&self, entity: IgnoredEntity) -> Result<(), StorageError> {
        let bytes = bincode::serialize(&entity)?;
        self.tree.insert(entity.object_id.as_bytes(), bytes)?;
        Ok(())
    }

    fn remove(&self, object_id: &str) -> Result<(), StorageError> {
        self.tree.remove(object_id.as_bytes())?;
        Ok(())
    }

    fn is_ignored_id(&self, object_id: &str) -> Result<bool, StorageError> {
        Ok(self.tree.contains_key(object_id.as_bytes())?)
    }
}

/// Process-local ignored-entity records
#[derive(Debug, Default)]
pub struct InMemoryIgnoredEntities {
    entries: RwLock<HashMap<String, IgnoredEntity>>,
}

impl InMemoryIgnoredEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl IgnoredEntitiesStorage for InMemoryIgnoredEntities {
    fn add(&self, entity: IgnoredEntity) -> Result<(), StorageError> {
        self.entries.write().insert(entity.object_id.clone(), entity);
        Ok(())
    }

    fn remove(&self, object_id: &str) -> Result<(), StorageError> {
        self.entries.write().remove(object_id);
        Ok(())
    }

    fn is_ignored_id(&self, object_id: &str) -> Result<bool, StorageError> {
        Ok(self.entries.read().contains_key(object_id))
    }
}
