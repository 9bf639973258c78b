//! Per-folder configuration file: `<local root>/.cmsync/config.toml`

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".cmsync";

pub fn config_path(local_root: &Path) -> PathBuf {
    local_root.join(CONFIG_DIR).join("config.toml")
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    local_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(File::from(config_path(local_root)).required(false)))
}
