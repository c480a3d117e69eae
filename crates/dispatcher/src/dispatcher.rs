//! Dispatcher - splits each batch between the two backends

use std::sync::Arc;

use contracts::{BackendId, DeliveryBackend, QueueClient, QueuedItem, RelayConfig};
use tracing::{debug, info, instrument};

use crate::health::{BackendHealth, HealthThresholds, HealthTracker, HealthTransition};
use crate::metrics::MetricsSnapshot;
use crate::sender::{BackendSender, SubBatchReport};
use crate::split::{partition, split_plan, SplitPlan};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Health hysteresis thresholds, shared by both backends
    pub thresholds: HealthThresholds,

    /// Concurrent deliveries per backend
    pub max_in_flight_sends: usize,

    /// Count poison messages against backend health
    pub poison_counts_as_failure: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thresholds: HealthThresholds::default(),
            max_in_flight_sends: 64,
            poison_counts_as_failure: false,
        }
    }
}

impl From<&RelayConfig> for DispatcherConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            thresholds: HealthThresholds::from(config),
            max_in_flight_sends: config.max_in_flight_sends,
            poison_counts_as_failure: config.poison_counts_as_failure,
        }
    }
}

/// Result of dispatching one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub plan: SplitPlan,
    pub a: SubBatchReport,
    pub b: SubBatchReport,
    /// Health changes applied after this batch
    pub transitions: Vec<(BackendId, HealthTransition)>,
}

impl DispatchReport {
    fn empty() -> Self {
        Self {
            plan: SplitPlan::default(),
            a: SubBatchReport::empty(BackendId::A),
            b: SubBatchReport::empty(BackendId::B),
            transitions: Vec::new(),
        }
    }

    pub fn report(&self, backend: BackendId) -> &SubBatchReport {
        match backend {
            BackendId::A => &self.a,
            BackendId::B => &self.b,
        }
    }
}

/// The dispatcher owning both senders and both health trackers
///
/// Health is only read and written between batches through `&mut self`.
pub struct Dispatcher<A, B, Q> {
    sender_a: BackendSender<A, Q>,
    sender_b: BackendSender<B, Q>,
    health_a: HealthTracker,
    health_b: HealthTracker,
}

impl<A, B, Q> Dispatcher<A, B, Q>
where
    A: DeliveryBackend + Sync + 'static,
    B: DeliveryBackend + Sync + 'static,
    Q: QueueClient + Sync + 'static,
{
    pub fn new(config: DispatcherConfig, backend_a: Arc<A>, backend_b: Arc<B>, queue: Arc<Q>) -> Self {
        let health_a = HealthTracker::new(backend_a.name(), config.thresholds);
        let health_b = HealthTracker::new(backend_b.name(), config.thresholds);

        let sender_a = BackendSender::new(
            BackendId::A,
            backend_a,
            Arc::clone(&queue),
            config.max_in_flight_sends,
        )
        .with_poison_counts_as_failure(config.poison_counts_as_failure);
        let sender_b = BackendSender::new(BackendId::B, backend_b, queue, config.max_in_flight_sends)
            .with_poison_counts_as_failure(config.poison_counts_as_failure);

        let dispatcher = Self {
            sender_a,
            sender_b,
            health_a,
            health_b,
        };
        dispatcher.publish_health(BackendId::A);
        dispatcher.publish_health(BackendId::B);
        dispatcher
    }

    /// Current health of a backend
    pub fn health(&self, backend: BackendId) -> BackendHealth {
        self.tracker(backend).health()
    }

    /// Display name of a backend
    pub fn backend_name(&self, backend: BackendId) -> &str {
        match backend {
            BackendId::A => self.sender_a.name(),
            BackendId::B => self.sender_b.name(),
        }
    }

    /// Split for a batch of `batch_size` under the current health
    pub fn plan(&self, batch_size: usize) -> SplitPlan {
        split_plan(
            batch_size,
            self.health_a.is_healthy(),
            self.health_b.is_healthy(),
        )
    }

    /// Get metrics for both senders
    pub fn metrics(&self) -> [(BackendId, MetricsSnapshot); 2] {
        [
            (BackendId::A, self.sender_a.metrics().snapshot()),
            (BackendId::B, self.sender_b.metrics().snapshot()),
        ]
    }

    /// Deliver a batch through both backends and update their health
    ///
    /// Both sub-batches run concurrently and complete before any health
    /// update. A backend that received no items keeps its health untouched.
    #[instrument(name = "dispatcher_dispatch", skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn dispatch(&mut self, batch: Vec<QueuedItem>) -> DispatchReport {
        if batch.is_empty() {
            return DispatchReport::empty();
        }

        let plan = self.plan(batch.len());
        let (for_a, for_b) = partition(batch, plan);
        debug!(to_a = plan.to_a, to_b = plan.to_b, "Batch split");

        for backend in [BackendId::A, BackendId::B] {
            metrics::counter!(
                "mail_relay_split_items_total",
                "backend" => self.backend_name(backend).to_string()
            )
            .increment(plan.share(backend) as u64);
        }

        let (a, b) = tokio::join!(
            self.sender_a.send_batch(for_a),
            self.sender_b.send_batch(for_b)
        );

        let mut transitions = Vec::new();
        for report in [&a, &b] {
            if report.attempted == 0 {
                continue;
            }
            if let Some(transition) = self.tracker_mut(report.backend).record(report.failures) {
                self.record_transition(report.backend, transition);
                transitions.push((report.backend, transition));
            }
        }

        info!(
            to_a = plan.to_a,
            to_b = plan.to_b,
            failures_a = a.failures,
            failures_b = b.failures,
            "Batch dispatched"
        );

        DispatchReport {
            plan,
            a,
            b,
            transitions,
        }
    }

    fn tracker(&self, backend: BackendId) -> &HealthTracker {
        match backend {
            BackendId::A => &self.health_a,
            BackendId::B => &self.health_b,
        }
    }

    fn tracker_mut(&mut self, backend: BackendId) -> &mut HealthTracker {
        match backend {
            BackendId::A => &mut self.health_a,
            BackendId::B => &mut self.health_b,
        }
    }

    fn record_transition(&self, backend: BackendId, transition: HealthTransition) {
        metrics::counter!(
            "mail_relay_health_transitions_total",
            "backend" => self.backend_name(backend).to_string(),
            "to" => transition.as_str()
        )
        .increment(1);
        self.publish_health(backend);
    }

    fn publish_health(&self, backend: BackendId) {
        let healthy = if self.tracker(backend).is_healthy() { 1.0 } else { 0.0 };
        metrics::gauge!(
            "mail_relay_backend_healthy",
            "backend" => self.backend_name(backend).to_string()
        )
        .set(healthy);
    }
}

/// Convenience function to create a dispatcher from the relay configuration
pub fn create_dispatcher<A, B, Q>(
    config: &RelayConfig,
    backend_a: Arc<A>,
    backend_b: Arc<B>,
    queue: Arc<Q>,
) -> Dispatcher<A, B, Q>
where
    A: DeliveryBackend + Sync + 'static,
    B: DeliveryBackend + Sync + 'static,
    Q: QueueClient + Sync + 'static,
{
    Dispatcher::new(DispatcherConfig::from(config), backend_a, backend_b, queue)
}
