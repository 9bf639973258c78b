//! Built-in defaults, the lowest layer of every merge.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("repository.root_path", "/")?
        .set_default("storage.strict_validation", true)?
        .set_default("sync.poll_interval_secs", 300)?
        .set_default("sync.checksum_algorithm", crate::types::BLAKE3)?
        .set_default("logging.level", "info")
}
