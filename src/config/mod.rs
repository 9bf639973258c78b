//! Configuration
//!
//! Layered loading with the `config` crate: built-in defaults, then the
//! global file, then the file inside the synchronized folder, then
//! `CMSYNC__*` environment variables.

mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::StorageConfig;

use crate::error::SyncError;
use crate::filter::FilterConfig;
use crate::logging::LoggingConfig;
use crate::types::BLAKE3;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote side of the synchronized folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Object id of the remote folder mapped onto the local root
    #[serde(default)]
    pub root_folder_id: String,

    /// Repository path of that folder, used to build remote paths
    #[serde(default = "default_remote_root_path")]
    pub root_path: String,
}

fn default_remote_root_path() -> String {
    "/".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root_folder_id: String::new(),
            root_path: default_remote_root_path(),
        }
    }
}

/// Reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between scheduled passes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Checksum algorithm recorded for new files
    #[serde(default = "default_checksum_algorithm")]
    pub checksum_algorithm: String,

    /// Request a pass as soon as the queue starts
    #[serde(default = "default_true")]
    pub sync_on_start: bool,
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_checksum_algorithm() -> String {
    BLAKE3.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            checksum_algorithm: default_checksum_algorithm(),
            sync_on_start: default_true(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub filters: FilterConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.sync.poll_interval_secs == 0 {
            return Err(SyncError::ConfigError(
                "sync.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.sync.checksum_algorithm.trim().is_empty() {
            return Err(SyncError::ConfigError(
                "sync.checksum_algorithm must not be empty".to_string(),
            ));
        }
        if !self.repository.root_path.starts_with('/') {
            return Err(SyncError::ConfigError(format!(
                "repository.root_path must be absolute, got {:?}",
                self.repository.root_path
            )));
        }
        Ok(())
    }
}
