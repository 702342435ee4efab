//! Run identity and the write-once halt flag
//!
//! One `Instance` exists per crawl run. Workers only read it; the engine and
//! failing workers halt it.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// Seeding finished, no worker busy, nothing pending
    Completed,

    /// The seed loader returned an error or panicked
    SeedFailed,

    /// A worker hit an unclassified error or panicked
    WorkerFailed,

    /// A crawl/process error re-raised in testing mode
    TaskFailed,

    /// Operator interrupt (Ctrl-C)
    Interrupted,
}

impl HaltReason {
    /// Returns true if the run stopped because something went wrong
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::SeedFailed | Self::WorkerFailed | Self::TaskFailed)
    }

    /// Converts the halt reason to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::SeedFailed => "seed_failed",
            Self::WorkerFailed => "worker_failed",
            Self::TaskFailed => "task_failed",
            Self::Interrupted => "interrupted",
        }
    }

    /// Parses a halt reason from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "seed_failed" => Some(Self::SeedFailed),
            "worker_failed" => Some(Self::WorkerFailed),
            "task_failed" => Some(Self::TaskFailed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// The moment a run was halted and the reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halt {
    pub at: DateTime<Utc>,
    pub reason: HaltReason,
}

/// One crawl run
///
/// `stop_at` is write-once: the first `halt` wins and later calls are no-ops,
/// so the timestamp and reason of the first stop are never overwritten.
#[derive(Debug)]
pub struct Instance {
    id: String,
    started_at: DateTime<Utc>,
    halt: OnceLock<Halt>,
}

impl Instance {
    /// Creates a run with a freshly generated id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Creates a run with a caller-chosen id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
            halt: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Halts the run
    ///
    /// Returns `true` if this call set the flag, `false` if the run was
    /// already halted.
    pub fn halt(&self, reason: HaltReason) -> bool {
        let mut won = false;
        self.halt.get_or_init(|| {
            won = true;
            Halt {
                at: Utc::now(),
                reason,
            }
        });
        if won {
            tracing::debug!(instance = %self.id, %reason, "instance halted");
        }
        won
    }

    pub fn is_halted(&self) -> bool {
        self.halt.get().is_some()
    }

    /// Timestamp of the first halt, if any
    pub fn stop_at(&self) -> Option<DateTime<Utc>> {
        self.halt.get().map(|h| h.at)
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt.get().map(|h| h.reason)
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}
