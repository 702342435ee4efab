//! Configuration module for FastGets
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use fastgets::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fastgets.toml")).unwrap();
//! println!("Workers: {}", config.engine.effective_thread_num());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EngineConfig, HttpConfig, OutputConfig, RateLimitEntry, SeedEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_config_text, load_config, load_config_with_hash, parse_config,
};
