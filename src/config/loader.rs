//! Configuration loading

use super::schema::SpladeSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Parse and validate a YAML configuration
pub fn parse_config(yaml: &str) -> Result<SpladeSpec> {
    let spec: SpladeSpec = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))?;
    validate_config(&spec)?;
    Ok(spec)
}

/// Load and validate a YAML configuration from disk
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<SpladeSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;
    parse_config(&yaml_content)
}
