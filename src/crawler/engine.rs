//! Local engine - run lifecycle orchestration
//!
//! The engine owns one run from start to finish:
//! - Starting the seed loader thread and waiting for its ready signal
//! - Starting the worker threads
//! - Polling the idle condition
//! - Halting, draining and joining every thread
//! - Handing the run report to each writer, in registration order

use crate::config::EngineConfig;
use crate::crawler::worker::{panic_message, Worker};
use crate::crawler::{InstanceStats, PendingPool};
use crate::output::{RunReport, Writer};
use crate::state::{HaltReason, Instance, RunningStatusList};
use crate::task::Reason;
use crate::template::{SeedContext, SeedSignal, Template};
use crate::FastGetsError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// State shared between the engine, the seed loader and the workers
#[derive(Debug)]
pub struct RunState {
    instance: Arc<Instance>,
    pool: Arc<PendingPool>,
    stats: Arc<InstanceStats>,
    status: RunningStatusList,
    seeding: AtomicBool,
}

impl RunState {
    pub fn new(
        instance: Arc<Instance>,
        pool: Arc<PendingPool>,
        stats: Arc<InstanceStats>,
        workers: usize,
    ) -> Self {
        Self {
            instance,
            pool,
            stats,
            status: RunningStatusList::new(workers),
            seeding: AtomicBool::new(false),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn pool(&self) -> &PendingPool {
        &self.pool
    }

    pub fn stats(&self) -> &InstanceStats {
        &self.stats
    }

    pub fn status(&self) -> &RunningStatusList {
        &self.status
    }

    pub fn is_seeding(&self) -> bool {
        self.seeding.load(Ordering::SeqCst)
    }

    pub fn set_seeding(&self, seeding: bool) {
        self.seeding.store(seeding, Ordering::SeqCst);
    }

    /// Whether the run still has work in flight
    ///
    /// False once the instance is halted. Otherwise true while the seed loader
    /// is alive, a worker holds a task, or tasks are pending.
    pub fn is_running(&self) -> bool {
        if self.instance.is_halted() {
            return false;
        }
        if self.is_seeding() {
            return true;
        }
        !self.pool.is_idle(self.instance.id(), &self.status)
    }
}

/// Marks seeding finished and fires the ready signal, even on panic
struct SeedDone<'a> {
    state: &'a RunState,
    signal: &'a SeedSignal,
}

impl Drop for SeedDone<'_> {
    fn drop(&mut self) {
        self.state.set_seeding(false);
        self.signal.notify();
    }
}

/// Runs one crawl instance on local OS threads
pub struct LocalEngine {
    config: EngineConfig,
    template: Arc<dyn Template>,
    writers: Vec<Box<dyn Writer>>,
    state: Arc<RunState>,
}

impl LocalEngine {
    /// Creates an engine for a fresh instance
    pub fn new(config: EngineConfig, template: Arc<dyn Template>) -> Self {
        Self::with_instance(config, template, Arc::new(Instance::new()))
    }

    /// Creates an engine for a caller-provided instance
    pub fn with_instance(
        config: EngineConfig,
        template: Arc<dyn Template>,
        instance: Arc<Instance>,
    ) -> Self {
        let state = RunState::new(
            instance,
            Arc::new(PendingPool::new()),
            Arc::new(InstanceStats::new()),
            config.effective_thread_num(),
        );

        Self {
            config,
            template,
            writers: Vec::new(),
            state: Arc::new(state),
        }
    }

    /// Registers a writer; writers are saved in registration order
    pub fn add_writer(&mut self, writer: Box<dyn Writer>) -> &mut Self {
        self.writers.push(writer);
        self
    }

    pub fn instance(&self) -> Arc<Instance> {
        Arc::clone(&self.state.instance)
    }

    pub fn pool(&self) -> Arc<PendingPool> {
        Arc::clone(&self.state.pool)
    }

    pub fn state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Runs the instance to completion
    ///
    /// Returns the run report once every writer has saved. A fatal error
    /// (seed failure, unclassified worker error, or a task error in testing
    /// mode) is returned instead, after the writers have still been given the
    /// report.
    pub fn run(self) -> Result<RunReport, FastGetsError> {
        let threads = self.config.effective_thread_num();
        let instance = self.state.instance();

        tracing::info!(
            instance = instance.id(),
            threads,
            testing = self.config.testing,
            template = self.template.name(),
            "starting run"
        );

        let mut first_error: Option<FastGetsError> = None;

        let signal = Arc::new(SeedSignal::new());
        let seeder = match self.spawn_seeder(Arc::clone(&signal)) {
            Ok(handle) => Some(handle),
            Err(e) => {
                instance.halt(HaltReason::SeedFailed);
                first_error = Some(e);
                None
            }
        };

        self.wait_for_seeds(&signal, seeder.is_some());

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let worker = Worker::new(id, Arc::clone(&self.state), &self.config);
            match thread::Builder::new()
                .name(format!("fastgets-worker-{}", id))
                .spawn(move || worker.run())
            {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    instance.halt(HaltReason::WorkerFailed);
                    first_error.get_or_insert(FastGetsError::Spawn(e));
                    break;
                }
            }
        }

        while self.state.is_running() {
            thread::sleep(self.config.poll_interval());
        }

        if instance.halt(HaltReason::Completed) {
            tracing::info!(instance = instance.id(), "run idle, halting");
        }

        thread::sleep(self.config.drain_delay());

        if let Some(handle) = seeder {
            let joined = handle
                .join()
                .unwrap_or_else(|payload| Err(FastGetsError::SeedLoad(panic_message(&*payload))));
            if let Err(e) = joined {
                first_error.get_or_insert(e);
            }
        }
        for (worker, handle) in workers.into_iter().enumerate() {
            let joined = handle.join().unwrap_or_else(|payload| {
                Err(FastGetsError::Fatal {
                    worker,
                    message: panic_message(&*payload),
                })
            });
            if let Err(e) = joined {
                first_error.get_or_insert(e);
            }
        }

        let unprocessed = self.state.pool.clear(instance.id());
        let report = RunReport {
            instance_id: instance.id().to_string(),
            started_at: instance.started_at(),
            stopped_at: instance.stop_at(),
            halt_reason: instance.halt_reason(),
            threads,
            stats: self.state.stats.snapshot(instance.id()),
            seeded: self.state.pool.reason_count(instance.id(), Reason::Seed),
            discovered: self.state.pool.reason_count(instance.id(), Reason::Discovered),
            unprocessed,
        };

        tracing::info!(
            instance = %report.instance_id,
            reason = ?report.halt_reason,
            succeeded = report.stats.succeeded,
            crawl_errors = report.stats.crawl_errors,
            process_errors = report.stats.process_errors,
            rate_limited = report.stats.rate_limited,
            unprocessed,
            "run finished"
        );

        let mut output_error = None;
        for writer in &self.writers {
            tracing::info!(writer = writer.name(), "saving results");
            if let Err(e) = writer.save(&report) {
                tracing::error!(writer = writer.name(), error = %e, "writer failed");
                output_error.get_or_insert(e);
            }
        }

        match (first_error, output_error) {
            (Some(e), _) => Err(e),
            (None, Some(e)) => Err(FastGetsError::Output(e)),
            (None, None) => Ok(report),
        }
    }

    /// Blocks until the seed loader signals readiness, bounded by `seed_wait`
    ///
    /// Returns immediately when no loader was started.
    fn wait_for_seeds(&self, signal: &SeedSignal, loader_started: bool) -> bool {
        if !loader_started {
            return false;
        }
        let ready = signal.wait(self.config.seed_wait());
        if !ready {
            tracing::debug!(
                pending = self.state.pool.get_current_task_num(self.state.instance().id()),
                "seed loader not ready yet, starting workers anyway"
            );
        }
        ready
    }

    fn spawn_seeder(
        &self,
        signal: Arc<SeedSignal>,
    ) -> Result<JoinHandle<Result<(), FastGetsError>>, FastGetsError> {
        let state = Arc::clone(&self.state);
        let template = Arc::clone(&self.template);

        state.set_seeding(true);
        let spawned = thread::Builder::new()
            .name("fastgets-seed".to_string())
            .spawn(move || {
                let _done = SeedDone {
                    state: &state,
                    signal: &signal,
                };
                let instance = state.instance();
                let ctx = SeedContext::new(instance, state.pool(), &signal);

                tracing::info!(template = template.name(), "seed loading start");
                let result = panic::catch_unwind(AssertUnwindSafe(|| template.load(&ctx)))
                    .unwrap_or_else(|payload| {
                        Err(FastGetsError::SeedLoad(panic_message(&*payload)))
                    });

                match result {
                    Ok(()) => {
                        tracing::info!(
                            template = template.name(),
                            pending = state.pool().get_current_task_num(instance.id()),
                            "seed loading finish"
                        );
                        Ok(())
                    }
                    Err(e) => {
                        instance.halt(HaltReason::SeedFailed);
                        let dropped = state.pool().clear(instance.id());
                        tracing::error!(
                            template = template.name(),
                            error = %e,
                            dropped,
                            "seed loading failed, halting run"
                        );
                        Err(match e {
                            FastGetsError::SeedLoad(_) => e,
                            other => FastGetsError::SeedLoad(other.to_string()),
                        })
                    }
                }
            });

        spawned.map_err(|e| {
            self.state.set_seeding(false);
            FastGetsError::Spawn(e)
        })
    }
}
