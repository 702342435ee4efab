use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Unknown handler names, malformed seed URLs and out-of-range engine
/// settings are all rejected here, before any thread is started.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - The parsed configuration, already validated
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use fastgets::config::load_config;
///
/// let config = load_config(Path::new("fastgets.toml")).unwrap();
/// println!("{} seeds on {} threads", config.seed.len(), config.engine.effective_thread_num());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded with every run so results can be traced back to the settings
/// that produced them.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded digest of the file content
/// * `Err(ConfigError)` - The file could not be read
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_config_text(&content))
}

/// Hex-encoded SHA-256 of configuration text
pub fn hash_config_text(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a configuration and returns both the config and its hash
///
/// The file is read once; the hash always describes the text that was parsed.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - The validated configuration and the hash of its text
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let hash = hash_config_text(&content);
    let config = parse_config(&content)?;
    Ok((config, hash))
}
