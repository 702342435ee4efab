//! Crawler module: the concurrent crawl-and-process engine
//!
//! This module contains:
//! - The pending pool shared by all workers
//! - Per-instance rate limiting
//! - The crawl/process pipeline for a single task
//! - The worker loop and the engine that orchestrates a run

mod engine;
mod instance_stats;
mod pending_pool;
mod pipeline;
mod worker;

pub use engine::{LocalEngine, RunState};
pub use instance_stats::{InstanceStats, StatsSnapshot};
pub use pending_pool::{Claim, PendingPool};
pub use pipeline::finish;
