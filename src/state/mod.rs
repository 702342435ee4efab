//! State module for tracking a crawl run
//!
//! # Components
//!
//! - `Instance`: run identity plus the write-once halt flag (`stop_at`)
//! - `HaltReason`: why a run stopped
//! - `RunningStatusList`: one busy flag per worker thread

mod instance;
mod running_status;

// Re-export main types
pub use instance::{Halt, HaltReason, Instance};
pub use running_status::RunningStatusList;
