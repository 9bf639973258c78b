//! StorageConfig and the resolution of the metadata store location.

use crate::config::xdg;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store location; relative paths are taken from the local root, `None`
    /// selects the per-folder XDG data directory
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Validate the stored structure on every mutation
    #[serde(default = "default_true")]
    pub strict_validation: bool,
}

impl StorageConfig {
    /// Resolve the store directory for the folder at `local_root`.
    pub fn resolve_path(&self, local_root: &Path) -> Result<PathBuf, SyncError> {
        match &self.store_path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(local_root.join(path)),
            None => Ok(xdg::root_data_dir(local_root)?.join("store")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            strict_validation: default_true(),
        }
    }
}
