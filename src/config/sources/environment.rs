//! Environment variable source: CMSYNC__ prefix with __ separator

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, Map};

/// Environment source; `vars` replaces the process environment when given.
pub fn source(vars: Option<Map<String, String>>) -> Environment {
    Environment::with_prefix("CMSYNC")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(vars)
}

/// Add environment variable overlay to builder.
/// `CMSYNC__SYNC__POLL_INTERVAL_SECS=60` sets `sync.poll_interval_secs`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(source(None)))
}
