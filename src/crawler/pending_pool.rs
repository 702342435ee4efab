//! Pending pool: the shared queue of not-yet-claimed tasks
//!
//! Tasks are partitioned by instance id. Every operation takes one short
//! lock; tasks never run while it is held.

use crate::state::RunningStatusList;
use crate::task::{Reason, Task};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Partition {
    queue: VecDeque<Box<dyn Task>>,
    enqueued: HashMap<Reason, u64>,
}

/// Thread-safe FIFO of pending tasks keyed by instance id
#[derive(Debug, Default)]
pub struct PendingPool {
    partitions: Mutex<HashMap<String, Partition>>,
}

impl PendingPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Partition>> {
        // Queue membership stays consistent even if a holder panicked
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes and returns one pending task for the instance
    ///
    /// `None` means the queue is empty, which is not an error. The check and
    /// the removal happen under one lock, so concurrent callers never receive
    /// the same task.
    pub fn fetch(&self, instance_id: &str) -> Option<Box<dyn Task>> {
        let mut partitions = self.lock();
        partitions.get_mut(instance_id)?.queue.pop_front()
    }

    /// Like [`fetch`](Self::fetch), but marks `slot` busy before the lock is
    /// released
    ///
    /// The returned [`Claim`] clears the slot, again under the pool lock, when
    /// dropped. Together with [`is_idle`](Self::is_idle) this means no observer
    /// ever sees an empty queue and an idle worker while that worker holds a
    /// task or is about to enqueue one.
    pub fn fetch_claimed<'a>(
        &'a self,
        instance_id: &str,
        status: &'a RunningStatusList,
        slot: usize,
    ) -> Option<(Box<dyn Task>, Claim<'a>)> {
        let mut partitions = self.lock();
        let task = partitions.get_mut(instance_id)?.queue.pop_front()?;
        status.set(slot, true);
        Some((
            task,
            Claim {
                pool: self,
                status,
                slot,
            },
        ))
    }

    /// True when nothing is pending for the instance and no slot in `status`
    /// is busy, read as one consistent snapshot
    pub fn is_idle(&self, instance_id: &str, status: &RunningStatusList) -> bool {
        let partitions = self.lock();
        let pending = partitions
            .get(instance_id)
            .map(|p| p.queue.len())
            .unwrap_or(0);
        pending == 0 && !status.any_running()
    }

    /// Enqueues a task for its own instance, tagged with why it was added
    pub fn add(&self, task: Box<dyn Task>, reason: Reason) {
        let mut partitions = self.lock();
        let partition = partitions
            .entry(task.instance_id().to_string())
            .or_default();

        tracing::trace!(
            instance = task.instance_id(),
            url = task.url(),
            %reason,
            "task enqueued"
        );

        *partition.enqueued.entry(reason).or_insert(0) += 1;
        partition.queue.push_back(task);
    }

    /// Number of pending (unclaimed) tasks for the instance
    pub fn get_current_task_num(&self, instance_id: &str) -> usize {
        self.lock()
            .get(instance_id)
            .map(|p| p.queue.len())
            .unwrap_or(0)
    }

    /// Total number of times a task was enqueued with `reason`
    pub fn reason_count(&self, instance_id: &str, reason: Reason) -> u64 {
        self.lock()
            .get(instance_id)
            .and_then(|p| p.enqueued.get(&reason).copied())
            .unwrap_or(0)
    }

    /// Drops whatever is still pending for the instance
    ///
    /// Returns the number of tasks discarded.
    pub fn clear(&self, instance_id: &str) -> usize {
        self.lock()
            .get_mut(instance_id)
            .map(|p| {
                let left = p.queue.len();
                p.queue.clear();
                left
            })
            .unwrap_or(0)
    }
}

/// A worker's hold on a fetched task
///
/// Dropping it marks the worker idle. This also runs while unwinding, so a
/// panicking task still releases its slot.
#[derive(Debug)]
pub struct Claim<'a> {
    pool: &'a PendingPool,
    status: &'a RunningStatusList,
    slot: usize,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let _partitions = self.pool.lock();
        self.status.set(self.slot, false);
    }
}
