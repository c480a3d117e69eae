//! Sender metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single backend sender
#[derive(Debug, Default)]
pub struct SenderMetrics {
    /// Sub-batches sent
    sub_batches: AtomicU64,
    /// Items accepted by the backend
    delivered: AtomicU64,
    /// Items returned to the queue after a failed delivery
    failed: AtomicU64,
    /// Unparseable items dropped from the queue
    poison: AtomicU64,
    /// Items whose terminal queue action did not complete
    queue_action_failures: AtomicU64,
}

impl SenderMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_sub_batches(&self) {
        self.sub_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get delivered count
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get poison count
    pub fn poison(&self) -> u64 {
        self.poison.load(Ordering::Relaxed)
    }

    pub fn inc_poison(&self) {
        self.poison.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_queue_action_failures(&self) {
        self.queue_action_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sub_batches: self.sub_batches.load(Ordering::Relaxed),
            delivered: self.delivered(),
            failed: self.failed(),
            poison: self.poison(),
            queue_action_failures: self.queue_action_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sender metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sub_batches: u64,
    pub delivered: u64,
    pub failed: u64,
    pub poison: u64,
    pub queue_action_failures: u64,
}
