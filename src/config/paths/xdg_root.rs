//! XDG Base Directory locations for configuration and per-folder data.

use crate::error::SyncError;
use std::path::{Component, Path, PathBuf};

/// `$XDG_DATA_HOME`, defaulting to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data_home));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, SyncError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config_home));
    }

    let home = std::env::var("HOME").map_err(|_| {
        SyncError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

pub fn global_config_path() -> Result<PathBuf, SyncError> {
    Ok(config_home()?.join("cmsync").join("config.toml"))
}

/// Data directory of one synchronized folder.
///
/// The canonical local root is mirrored below `$XDG_DATA_HOME/cmsync`, so
/// `/home/u/Documents` maps to `$XDG_DATA_HOME/cmsync/home/u/Documents`.
pub fn root_data_dir(local_root: &Path) -> Result<PathBuf, SyncError> {
    let data_home = data_home().ok_or_else(|| {
        SyncError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    let canonical = dunce::canonicalize(local_root).map_err(|e| {
        SyncError::ConfigError(format!("Failed to canonicalize local root: {}", e))
    })?;
    Ok(mirror_below(data_home.join("cmsync"), &canonical))
}

fn mirror_below(mut base: PathBuf, path: &Path) -> PathBuf {
    for component in path.components() {
        if let Component::Normal(name) = component {
            base.push(name);
        }
    }
    base
}
