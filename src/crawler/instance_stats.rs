//! Per-instance rate limiting and run counters
//!
//! Quotas are enforced over a trailing one-second window per
//! (instance, category). A check that passes records the dispatch under the
//! same lock, so two callers racing for the last slot cannot both win.

use crate::task::RateLimit;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Outcome counters for one instance
#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicU64,
    crawl_errors: AtomicU64,
    process_errors: AtomicU64,
    rate_limited: AtomicU64,
}

/// Point-in-time copy of an instance's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub succeeded: u64,
    pub crawl_errors: u64,
    pub process_errors: u64,
    pub rate_limited: u64,
}

impl StatsSnapshot {
    /// Tasks that ran through the pipeline, successfully or not
    pub fn executed(&self) -> u64 {
        self.succeeded + self.crawl_errors + self.process_errors
    }
}

/// Tracks rate-limit windows and outcome counters per instance
#[derive(Debug, Default)]
pub struct InstanceStats {
    windows: Mutex<HashMap<(String, String), VecDeque<Instant>>>,
    counters: Mutex<HashMap<String, Arc<Counters>>>,
}

impl InstanceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if running a task of `rate_spec`'s category now would
    /// exceed its per-second quota
    ///
    /// When this returns false the execution is counted against the quota.
    pub fn check_rate_limit(&self, instance_id: &str, rate_spec: &RateLimit) -> bool {
        self.check_rate_limit_at(instance_id, rate_spec, Instant::now())
    }

    /// [`check_rate_limit`](Self::check_rate_limit) against an explicit clock
    pub fn check_rate_limit_at(&self, instance_id: &str, rate_spec: &RateLimit, now: Instant) -> bool {
        self.throttle_at(instance_id, rate_spec, now).is_some()
    }

    /// Like [`check_rate_limit_at`](Self::check_rate_limit_at), but a
    /// throttled check returns how long until the oldest entry in the window
    /// expires
    ///
    /// A zero quota never frees up; it reports a full window.
    pub fn throttle_at(&self, instance_id: &str, rate_spec: &RateLimit, now: Instant) -> Option<Duration> {
        let wait = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            let window = windows
                .entry((instance_id.to_string(), rate_spec.category.clone()))
                .or_default();

            while let Some(&oldest) = window.front() {
                if now.saturating_duration_since(oldest) >= WINDOW {
                    window.pop_front();
                } else {
                    break;
                }
            }

            if window.len() >= rate_spec.per_second as usize {
                let expires = window
                    .front()
                    .map(|&oldest| WINDOW.saturating_sub(now.saturating_duration_since(oldest)))
                    .unwrap_or(WINDOW);
                Some(expires)
            } else {
                window.push_back(now);
                None
            }
        };

        if wait.is_some() {
            self.counters(instance_id)
                .rate_limited
                .fetch_add(1, Ordering::Relaxed);
        }
        wait
    }

    fn counters(&self, instance_id: &str) -> Arc<Counters> {
        let mut counters = self.lock_counters();
        Arc::clone(counters.entry(instance_id.to_string()).or_default())
    }

    fn lock_counters(&self) -> MutexGuard<'_, HashMap<String, Arc<Counters>>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_success(&self, instance_id: &str) {
        self.counters(instance_id)
            .succeeded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crawl_error(&self, instance_id: &str) {
        self.counters(instance_id)
            .crawl_errors
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_process_error(&self, instance_id: &str) {
        self.counters(instance_id)
            .process_errors
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, instance_id: &str) -> StatsSnapshot {
        let counters = self.lock_counters();
        counters
            .get(instance_id)
            .map(|c| StatsSnapshot {
                succeeded: c.succeeded.load(Ordering::Relaxed),
                crawl_errors: c.crawl_errors.load(Ordering::Relaxed),
                process_errors: c.process_errors.load(Ordering::Relaxed),
                rate_limited: c.rate_limited.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }
}
