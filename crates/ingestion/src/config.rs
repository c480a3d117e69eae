//! Reader configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{RelayConfig, MAX_ITEMS_PER_RECEIVE};

/// Hard cap on the depth considered per queue, bounding in-flight work
pub const MAX_ITEMS_PER_QUEUE: u64 = 120_000;

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Source queues, probed in order
    pub queue_urls: Vec<String>,

    /// Concurrent receive calls across all queues
    pub max_concurrent_receives: usize,
}

impl ReaderConfig {
    pub fn new(queue_urls: Vec<String>) -> Self {
        Self {
            queue_urls,
            ..Default::default()
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            queue_urls: Vec::new(),
            max_concurrent_receives: 256,
        }
    }
}

impl From<&RelayConfig> for ReaderConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            queue_urls: config.queue_urls.clone(),
            max_concurrent_receives: config.max_concurrent_receives,
        }
    }
}

/// Number of parallel receive calls for a queue of the given depth
///
/// The depth is clamped to [`MAX_ITEMS_PER_QUEUE`]; one reader covers up to
/// [`MAX_ITEMS_PER_RECEIVE`] items, and at least one reader always runs so a
/// stale depth of zero cannot starve the queue.
pub fn reader_count(depth: u64) -> usize {
    let depth = depth.min(MAX_ITEMS_PER_QUEUE);
    let per_receive = MAX_ITEMS_PER_RECEIVE as u64;
    depth.div_ceil(per_receive).max(1) as usize
}

/// Reader metrics
#[derive(Debug, Default)]
pub struct ReaderMetrics {
    /// Total batches read
    pub batches: AtomicU64,

    /// Total items received
    pub items_received: AtomicU64,

    /// Queues skipped for an iteration because their depth was unavailable
    pub queues_skipped: AtomicU64,

    /// Failed receive calls
    pub receive_failures: AtomicU64,
}

impl ReaderMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&self, items: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.items_received
            .fetch_add(items as u64, Ordering::Relaxed);
    }

    pub fn record_queue_skipped(&self) {
        self.queues_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receive_failure(&self) {
        self.receive_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            items_received: self.items_received.load(Ordering::Relaxed),
            queues_skipped: self.queues_skipped.load(Ordering::Relaxed),
            receive_failures: self.receive_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub items_received: u64,
    pub queues_skipped: u64,
    pub receive_failures: u64,
}
