//! Writer trait and the data handed to writers
//!
//! This module defines the trait interface for result writers and the
//! structures they persist: the run report and the buffered page records.

use crate::crawler::StatsSnapshot;
use crate::state::HaltReason;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Persists the outcome of a run
///
/// Writers are called once, after every worker has stopped, in the order
/// they were registered with the engine.
pub trait Writer: Send {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Saves the run report and whatever results the writer collected
    fn save(&self, report: &RunReport) -> OutputResult<()>;
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub instance_id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub halt_reason: Option<HaltReason>,

    /// Worker threads actually started
    pub threads: usize,

    pub stats: StatsSnapshot,

    /// Tasks enqueued by the seed template
    pub seeded: u64,

    /// Tasks enqueued by other tasks while processing
    pub discovered: u64,

    /// Tasks still pending when the run halted
    pub unprocessed: usize,
}

impl RunReport {
    /// Wall-clock length of the run, if it was halted
    pub fn duration_seconds(&self) -> Option<f64> {
        self.stopped_at
            .map(|stopped| (stopped - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Whether the run stopped for a reason other than going idle
    pub fn is_failure(&self) -> bool {
        self.halt_reason.map(|r| r.is_failure()).unwrap_or(false)
    }
}

/// One processed page
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub url: String,

    /// Page title (if available)
    pub title: Option<String>,

    /// HTTP status code
    pub status_code: Option<u16>,

    /// Content type
    pub content_type: Option<String>,

    /// Link hops from the seed that led here
    pub depth: u32,

    /// Links found on the page, before filtering
    pub links_found: usize,

    /// Handler that processed the page
    pub func_name: String,

    pub fetched_at: DateTime<Utc>,
}

/// Page records shared between the tasks that produce them and the writers
/// that save them
#[derive(Debug, Clone, Default)]
pub struct ResultBuffer {
    records: Arc<Mutex<Vec<PageRecord>>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: PageRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Copy of every record pushed so far, in push order
    pub fn snapshot(&self) -> Vec<PageRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
