//! FastGets: a concurrent crawl-and-process engine
//!
//! A seed template fills a pending pool, a fixed pool of worker threads pulls
//! tasks from it, throttles them per rate-limit category, runs each task's
//! crawl and process phases, and the engine flushes results through the
//! registered writers once the run goes idle.

pub mod config;
pub mod crawler;
pub mod http;
pub mod output;
pub mod state;
pub mod task;
pub mod template;

use thiserror::Error;

/// Main error type for FastGets operations
#[derive(Debug, Error)]
pub enum FastGetsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A crawl or process error re-raised because the run is in testing mode
    #[error("Task error: {0}")]
    Task(#[from] task::TaskError),

    #[error("Seed loading failed: {0}")]
    SeedLoad(String),

    /// Unclassified failure inside a worker; halts the whole run
    #[error("Fatal error in worker {worker}: {message}")]
    Fatal { worker: usize, message: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown handler '{0}'")]
    UnknownHandler(String),
}

/// Result type alias for FastGets operations
pub type Result<T> = std::result::Result<T, FastGetsError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, EngineConfig};
pub use crawler::{finish, InstanceStats, LocalEngine, PendingPool};
pub use output::{RunReport, Writer};
pub use state::{HaltReason, Instance, RunningStatusList};
pub use task::{PageRaw, RateLimit, Reason, Task, TaskContext, TaskError};
pub use template::{SeedContext, Template};
