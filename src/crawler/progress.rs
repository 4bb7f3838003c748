//! Run progress tracking
//!
//! Shared counters updated by every worker and reported as log lines any
//! presentation layer can consume.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Counters for one harvest run
pub struct ProgressTracker {
    started: Instant,
    accepted: AtomicUsize,
    searches: AtomicUsize,
    target: usize,
}

impl ProgressTracker {
    pub fn new(target: usize, already_accepted: usize) -> Self {
        Self {
            started: Instant::now(),
            accepted: AtomicUsize::new(already_accepted),
            searches: AtomicUsize::new(0),
            target,
        }
    }

    /// Records one accepted record; returns the new total
    pub fn record_accepted(&self) -> usize {
        self.accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records one completed search task; returns the new total
    pub fn record_search(&self) -> usize {
        self.searches.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    /// Records accepted per hour since the run started
    pub fn rate_per_hour(&self) -> f64 {
        let hours = self.started.elapsed().as_secs_f64() / 3600.0;
        if hours <= 0.0 {
            return 0.0;
        }
        self.accepted() as f64 / hours
    }

    /// Emits a progress log line
    pub fn report(&self, active_credentials: usize, total_credentials: usize) {
        tracing::info!(
            "Progress: {}/{} records, {} searches, {:.1} records/hour, {}/{} credentials active",
            self.accepted(),
            self.target,
            self.searches(),
            self.rate_per_hour(),
            active_credentials,
            total_credentials
        );
    }
}
