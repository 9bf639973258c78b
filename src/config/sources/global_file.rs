//! Global configuration file: `$XDG_CONFIG_HOME/cmsync/config.toml`

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use tracing::debug;

/// Add the global file when it exists. A missing home directory only
/// skips this layer.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg::global_config_path() {
        Ok(path) => {
            debug!(path = %path.display(), "Global configuration layer");
            Ok(builder.add_source(File::from(path).required(false)))
        }
        Err(e) => {
            debug!(error = %e, "No global configuration directory");
            Ok(builder)
        }
    }
}
