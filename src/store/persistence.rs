//! Sled-backed [`MetaDataStorage`].

use super::{MappedObject, MetaDataStorage, PathMatcher, StoredSnapshot};
use crate::error::StorageError;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

const OBJECTS_TREE: &str = "mapped_objects";
const GUID_TREE: &str = "mapped_guids";

pub struct SledMetaDataStorage {
    objects: sled::Tree,
    guids: sled::Tree,
    matcher: PathMatcher,
    strict_validation: bool,
}

impl SledMetaDataStorage {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path, matcher: PathMatcher) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(&db, matcher)
    }

    pub fn from_db(db: &sled::Db, matcher: PathMatcher) -> Result<Self, StorageError> {
        Ok(Self {
            objects: db.open_tree(OBJECTS_TREE)?,
            guids: db.open_tree(GUID_TREE)?,
            matcher,
            strict_validation: false,
        })
    }

    /// Validate the whole structure before every mutation is committed
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    fn decode(bytes: &[u8]) -> Result<MappedObject, StorageError> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn subtree_ids(objects: &[MappedObject], root_id: &str) -> HashSet<String> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for object in objects {
            if let Some(parent) = &object.parent_id {
                children
                    .entry(parent.as_str())
                    .or_default()
                    .push(object.remote_object_id.as_str());
            }
        }
        let mut out = HashSet::new();
        let mut stack = vec![root_id];
        while let Some(id) = stack.pop() {
            if out.insert(id.to_string()) {
                if let Some(kids) = children.get(id) {
                    stack.extend(kids.iter().copied());
                }
            }
        }
        out
    }
}

impl MetaDataStorage for SledMetaDataStorage {
    fn get_object_list(&self) -> Result<Vec<MappedObject>, StorageError> {
        let mut out = Vec::new();
        for entry in self.objects.iter() {
            let (_, value) = entry?;
            out.push(Self::decode(&value)?);
        }
        Ok(out)
    }

    fn get_object_by_remote_id(&self, id: &str) -> Result<Option<MappedObject>, StorageError> {
        self.objects
            .get(id.as_bytes())?
            .map(|v| Self::decode(&v))
            .transpose()
    }

    fn get_object_by_guid(&self, guid: Uuid) -> Result<Option<MappedObject>, StorageError> {
        match self.guids.get(guid.as_bytes())? {
            Some(remote_id) => {
                let remote_id = String::from_utf8(remote_id.to_vec())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                self.get_object_by_remote_id(&remote_id)
            }
            None => Ok(None),
        }
    }

    fn save_mapped_object(&self, object: &MappedObject) -> Result<(), StorageError> {
        object.validate()?;

        if self.strict_validation {
            let mut prospective: Vec<MappedObject> = self
                .get_object_list()?
                .into_iter()
                .filter(|o| o.remote_object_id != object.remote_object_id)
                .collect();
            prospective.push(object.clone());
            StoredSnapshot::from_objects(prospective)?;
        }

        let previous = self.get_object_by_remote_id(&object.remote_object_id)?;
        if let Some(previous) = previous {
            if previous.guid != object.guid {
                self.guids.remove(previous.guid.as_bytes())?;
            }
        }

        let mut stored = object.clone();
        stored.last_stored_utc = Some(Utc::now());
        let bytes = bincode::serialize(&stored)?;
        self.objects.insert(object.remote_object_id.as_bytes(), bytes)?;
        self.guids
            .insert(object.guid.as_bytes(), object.remote_object_id.as_bytes())?;

        debug!(
            remote_id = %object.remote_object_id,
            guid = %object.guid,
            name = %object.name,
            "Saved mapped object"
        );
        Ok(())
    }

    fn remove_object(&self, object: &MappedObject) -> Result<(), StorageError> {
        let all = self.get_object_list()?;
        let doomed = Self::subtree_ids(&all, &object.remote_object_id);

        for stored in all.iter().filter(|o| doomed.contains(&o.remote_object_id)) {
            self.objects.remove(stored.remote_object_id.as_bytes())?;
            self.guids.remove(stored.guid.as_bytes())?;
        }

        if self.strict_validation {
            if let Err(e) = self.validate_object_structure() {
                warn!(remote_id = %object.remote_object_id, error = %e, "Store invalid after removal");
                return Err(e);
            }
        }

        debug!(
            remote_id = %object.remote_object_id,
            removed = doomed.len(),
            "Removed mapped object subtree"
        );
        Ok(())
    }

    fn path_matcher(&self) -> &PathMatcher {
        &self.matcher
    }
}
