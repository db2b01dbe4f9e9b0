//! tabhost configuration system.
//!
//! Provides TOML-based configuration with validation. All config sections
//! use defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::TabhostConfig;

use std::path::Path;

use tabhost_common::ConfigError;

/// Load config from the platform default path, creating it if missing.
pub fn load_config() -> Result<TabhostConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path. A missing file is an error.
pub fn load_config_from(path: &Path) -> Result<TabhostConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TabhostConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
