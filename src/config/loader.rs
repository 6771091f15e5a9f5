//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::store::Config;
use crate::error::ConfigError;

/// Load configuration from a TOML file.
///
/// Every top-level key becomes a config entry; tables and arrays keep their
/// nested shape.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::info!(path = %path.display(), keys = config.len(), "Configuration loaded");
    Ok(config)
}

/// Parse TOML text into a [`Config`] seeded with the base keys.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let table: toml::Table = toml::from_str(content)?;

    let mut config = Config::new();
    for (key, value) in table {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::invalid(&key, e))?;
        config.insert(key, value);
    }
    Ok(config)
}
