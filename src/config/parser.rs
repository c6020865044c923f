use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex-encoded SHA-256 of the configuration text
///
/// Logged at crawl start and written to the summary so a run can be matched
/// to the exact settings it used.
pub fn config_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Computes the digest of a configuration file on disk
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(config_digest(&content))
}

/// Loads a configuration and returns it with the digest of the same bytes
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, config_digest(&content)))
}
