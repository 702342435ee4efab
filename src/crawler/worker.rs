//! Worker loop: fetch, rate-check, execute
//!
//! Each worker owns one slot of the running status list. It exits when the
//! instance is halted, checked before every fetch.

use crate::config::EngineConfig;
use crate::crawler::engine::RunState;
use crate::crawler::pipeline::finish;
use crate::state::HaltReason;
use crate::task::{Reason, TaskContext, TaskError};
use crate::FastGetsError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub(crate) struct Worker {
    id: usize,
    state: Arc<RunState>,
    idle_sleep: Duration,
    testing: bool,
}

impl Worker {
    pub(crate) fn new(id: usize, state: Arc<RunState>, config: &EngineConfig) -> Self {
        Self {
            id,
            state,
            idle_sleep: config.idle_sleep(),
            testing: config.testing,
        }
    }

    /// Runs until the instance is halted
    ///
    /// Returns an error only for failures that halted the run: an unclassified
    /// error or panic in a task, or any task error in testing mode.
    pub(crate) fn run(self) -> Result<(), FastGetsError> {
        let state = &*self.state;
        let instance = state.instance();
        let instance_id = instance.id();
        let pool = state.pool();

        tracing::debug!(worker = self.id, "worker started");

        while !instance.is_halted() {
            let Some((mut task, claim)) = pool.fetch_claimed(instance_id, state.status(), self.id)
            else {
                thread::sleep(self.idle_sleep);
                continue;
            };

            let throttled = task.second_rate_limit().and_then(|limit| {
                state
                    .stats()
                    .throttle_at(instance_id, limit, Instant::now())
                    .map(|wait| (limit.category.clone(), wait))
            });

            if let Some((category, wait)) = throttled {
                tracing::debug!(
                    worker = self.id,
                    url = task.url(),
                    %category,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited, re-queueing"
                );
                pool.add(task, Reason::RateLimit);
                drop(claim);
                self.back_off(wait);
                continue;
            }

            let func_name = task.func_name().to_string();
            let url = task.url().to_string();
            let ctx = TaskContext::new(instance, pool);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| finish(task.as_mut(), &ctx)));

            match outcome {
                Ok(Ok(())) => state.stats().record_success(instance_id),
                Ok(Err(TaskError::Fatal(message))) => {
                    return Err(self.fatal(&func_name, &url, message))
                }
                Ok(Err(err)) => {
                    if let TaskError::Crawl { .. } = err {
                        state.stats().record_crawl_error(instance_id);
                    } else {
                        state.stats().record_process_error(instance_id);
                    }
                    tracing::error!(
                        worker = self.id,
                        func = %func_name,
                        %url,
                        error = %err,
                        "task failed"
                    );

                    if self.testing {
                        instance.halt(HaltReason::TaskFailed);
                        return Err(FastGetsError::Task(err));
                    }
                }
                Err(payload) => return Err(self.fatal(&func_name, &url, panic_message(&*payload))),
            }
        }

        tracing::debug!(worker = self.id, "worker stopped");
        Ok(())
    }

    /// Sleeps until a throttled category may free up, in slices of
    /// `idle_sleep` so a halt is still noticed promptly
    ///
    /// Called after the task is back in the pool and the slot is cleared.
    fn back_off(&self, wait: Duration) {
        let deadline = Instant::now() + wait;
        let instance = self.state.instance();
        while !instance.is_halted() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(self.idle_sleep));
        }
    }

    fn fatal(&self, func_name: &str, url: &str, message: String) -> FastGetsError {
        self.state.instance().halt(HaltReason::WorkerFailed);
        tracing::error!(
            worker = self.id,
            func = %func_name,
            %url,
            error = %message,
            "framework error, halting run"
        );
        FastGetsError::Fatal {
            worker: self.id,
            message,
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
