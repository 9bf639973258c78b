//! MergeService: orchestrates sources, applies merge policy, deserializes to SyncConfig.

use super::merge_policy;
use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::SyncConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> folder file -> environment (highest).
    pub fn load(local_root: &Path) -> Result<SyncConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, local_root)?;
        let builder = environment::add_to_builder(builder)?;

        debug!(local_root = %local_root.display(), "Loading configuration");
        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<SyncConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path));
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
