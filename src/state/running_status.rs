use std::sync::atomic::{AtomicBool, Ordering};

/// One busy flag per worker thread
///
/// Slot `i` is written only by worker `i` and read by the engine when it
/// decides whether the run is idle. Workers flip their slot while holding the
/// pending pool lock (see `PendingPool::fetch_claimed`).
#[derive(Debug)]
pub struct RunningStatusList {
    slots: Box<[AtomicBool]>,
}

impl RunningStatusList {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn set(&self, slot: usize, running: bool) {
        self.slots[slot].store(running, Ordering::SeqCst);
    }

    pub fn get(&self, slot: usize) -> bool {
        self.slots[slot].load(Ordering::SeqCst)
    }

    /// Returns true if any worker currently holds a claimed task
    pub fn any_running(&self) -> bool {
        self.slots.iter().any(|s| s.load(Ordering::SeqCst))
    }

    /// Number of workers currently holding a task
    pub fn running_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.load(Ordering::SeqCst))
            .count()
    }
}
