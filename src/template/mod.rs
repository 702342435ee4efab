//! Seed templates
//!
//! A template fills the pending pool once, at the start of a run, from the
//! seed loader thread. Any error it returns is fatal to the run.

mod seed_list;

pub use seed_list::SeedListTemplate;

use crate::crawler::PendingPool;
use crate::state::Instance;
use crate::task::{Reason, Task};
use crate::FastGetsError;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Source of the seed tasks for a run
pub trait Template: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Enqueues the seed tasks
    fn load(&self, ctx: &SeedContext<'_>) -> Result<(), FastGetsError>;
}

/// One-shot "seed tasks are available" signal
///
/// Fired by the template through [`SeedContext::ready`], or by the seed
/// loader when `load` returns, whichever comes first.
#[derive(Debug, Default)]
pub struct SeedSignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl SeedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        *ready = true;
        self.cond.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until notified or until `timeout` elapses
    ///
    /// Returns whether the signal fired.
    pub fn wait(&self, timeout: Duration) -> bool {
        let ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        let (ready, _) = self
            .cond
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
        *ready
    }
}

/// What a template may touch while loading
pub struct SeedContext<'a> {
    instance: &'a Instance,
    pool: &'a PendingPool,
    signal: &'a SeedSignal,
}

impl<'a> SeedContext<'a> {
    pub fn new(instance: &'a Instance, pool: &'a PendingPool, signal: &'a SeedSignal) -> Self {
        Self {
            instance,
            pool,
            signal,
        }
    }

    pub fn instance(&self) -> &Instance {
        self.instance
    }

    pub fn instance_id(&self) -> &str {
        self.instance.id()
    }

    /// Enqueues a seed task
    pub fn add(&self, task: Box<dyn Task>) {
        self.pool.add(task, Reason::Seed);
    }

    /// Lets workers start before loading has finished
    ///
    /// Call after the first batch is queued when the rest will take a while.
    pub fn ready(&self) {
        self.signal.notify();
    }
}
