//! BackendSender - delivers one sub-batch through one backend
//!
//! Every item gets its own task. A task is spawned only after a semaphore
//! permit is taken, so at most `max_in_flight` tasks are alive at once.
//! Each task parses the payload, hands the email to the backend and then
//! performs exactly one terminal queue action:
//!
//! | outcome   | queue action              | counts against health |
//! |-----------|---------------------------|-----------------------|
//! | delivered | delete                    | no                    |
//! | failed    | visibility reset to zero  | yes                   |
//! | poison    | delete                    | only when configured  |

use std::sync::Arc;
use std::time::Duration;

use contracts::{BackendId, DeliveryBackend, Email, QueueClient, QueuedItem};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::SenderMetrics;

/// Classified result of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Backend accepted the email
    Delivered,
    /// Backend errored or refused; the item will be redelivered
    Failed,
    /// Payload can never be parsed; the item is dropped
    Poison,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Poison => "poison",
        }
    }

    /// Whether the item is deleted rather than made visible again
    pub fn removes_from_queue(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    pub fn counts_as_failure(&self, poison_counts_as_failure: bool) -> bool {
        match self {
            Self::Delivered => false,
            Self::Failed => true,
            Self::Poison => poison_counts_as_failure,
        }
    }
}

#[derive(Debug)]
struct ItemResult {
    outcome: DeliveryOutcome,
    queue_action_failed: bool,
}

/// Aggregate result of one sub-batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBatchReport {
    pub backend: BackendId,
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub poison: usize,
    pub queue_action_failures: usize,
    /// Failure count fed to the backend's health tracker
    pub failures: usize,
}

impl SubBatchReport {
    pub fn empty(backend: BackendId) -> Self {
        Self {
            backend,
            attempted: 0,
            delivered: 0,
            failed: 0,
            poison: 0,
            queue_action_failures: 0,
            failures: 0,
        }
    }

    fn record(&mut self, result: &ItemResult, poison_counts_as_failure: bool) {
        match result.outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Failed => self.failed += 1,
            DeliveryOutcome::Poison => self.poison += 1,
        }
        if result.outcome.counts_as_failure(poison_counts_as_failure) {
            self.failures += 1;
        }
        if result.queue_action_failed {
            self.queue_action_failures += 1;
        }
    }
}

/// Sender bound to one backend slot
pub struct BackendSender<D, Q> {
    id: BackendId,
    backend: Arc<D>,
    queue: Arc<Q>,
    permits: Arc<Semaphore>,
    poison_counts_as_failure: bool,
    metrics: Arc<SenderMetrics>,
}

impl<D, Q> BackendSender<D, Q>
where
    D: DeliveryBackend + Sync + 'static,
    Q: QueueClient + Sync + 'static,
{
    pub fn new(id: BackendId, backend: Arc<D>, queue: Arc<Q>, max_in_flight: usize) -> Self {
        Self {
            id,
            backend,
            queue,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            poison_counts_as_failure: false,
            metrics: Arc::new(SenderMetrics::new()),
        }
    }

    /// Count poison messages against this backend's health
    pub fn with_poison_counts_as_failure(mut self, enabled: bool) -> Self {
        self.poison_counts_as_failure = enabled;
        self
    }

    pub fn id(&self) -> BackendId {
        self.id
    }

    /// Backend display name
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<SenderMetrics> {
        self.metrics.clone()
    }

    /// Deliver every item and wait for all of them
    #[instrument(
        name = "backend_sender_send_batch",
        skip(self, items),
        fields(backend = %self.id, name = %self.backend.name(), items = items.len())
    )]
    pub async fn send_batch(&self, items: Vec<QueuedItem>) -> SubBatchReport {
        let mut report = SubBatchReport::empty(self.id);
        if items.is_empty() {
            return report;
        }

        report.attempted = items.len();
        self.metrics.inc_sub_batches();

        let mut tasks = JoinSet::new();
        for item in items {
            while let Some(joined) = tasks.try_join_next() {
                self.collect(joined, &mut report);
            }

            // Spawn only while holding a permit, so live tasks never exceed the cap
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let e = DispatcherError::PermitsClosed { backend: self.id };
                    error!(error = %e, message_id = %item.message_id, "Item was not attempted");
                    self.collect(
                        Ok(ItemResult {
                            outcome: DeliveryOutcome::Failed,
                            queue_action_failed: false,
                        }),
                        &mut report,
                    );
                    continue;
                }
            };

            let backend = Arc::clone(&self.backend);
            let queue = Arc::clone(&self.queue);
            tasks.spawn(async move {
                let _permit = permit;
                deliver_item(backend.as_ref(), queue.as_ref(), &item).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &mut report);
        }

        self.publish(&report);
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            poison = report.poison,
            "Sub-batch complete"
        );
        report
    }

    fn collect(&self, joined: Result<ItemResult, JoinError>, report: &mut SubBatchReport) {
        let result = joined.unwrap_or_else(|e| {
            let e = DispatcherError::task_failed(self.id, e.to_string());
            error!(error = %e, "Delivery task aborted, item left to the visibility timeout");
            ItemResult {
                outcome: DeliveryOutcome::Failed,
                queue_action_failed: true,
            }
        });
        self.record(&result);
        report.record(&result, self.poison_counts_as_failure);
    }

    fn record(&self, result: &ItemResult) {
        match result.outcome {
            DeliveryOutcome::Delivered => self.metrics.inc_delivered(),
            DeliveryOutcome::Failed => self.metrics.inc_failed(),
            DeliveryOutcome::Poison => self.metrics.inc_poison(),
        }
        if result.queue_action_failed {
            self.metrics.inc_queue_action_failures();
        }
    }

    fn publish(&self, report: &SubBatchReport) {
        let counts = [
            (DeliveryOutcome::Delivered, report.delivered),
            (DeliveryOutcome::Failed, report.failed),
            (DeliveryOutcome::Poison, report.poison),
        ];
        for (outcome, count) in counts {
            if count > 0 {
                metrics::counter!(
                    "mail_relay_deliveries_total",
                    "backend" => self.backend.name().to_string(),
                    "outcome" => outcome.as_str()
                )
                .increment(count as u64);
            }
        }
    }
}

/// Deliver one item and apply its queue action
async fn deliver_item<D, Q>(backend: &D, queue: &Q, item: &QueuedItem) -> ItemResult
where
    D: DeliveryBackend + Sync,
    Q: QueueClient + Sync,
{
    let outcome = match Email::from_payload(&item.message_id, &item.body) {
        Err(e) => {
            error!(
                queue = %item.queue,
                message_id = %item.message_id,
                error = %e,
                "Dropping poison message"
            );
            DeliveryOutcome::Poison
        }
        Ok(email) => match backend.send(&email).await {
            Ok(receipt) if receipt.accepted => DeliveryOutcome::Delivered,
            Ok(receipt) => {
                warn!(
                    backend = backend.name(),
                    message_id = %item.message_id,
                    status = %receipt.status,
                    "Delivery rejected"
                );
                DeliveryOutcome::Failed
            }
            Err(e) => {
                warn!(
                    backend = backend.name(),
                    message_id = %item.message_id,
                    error = %e,
                    "Delivery failed"
                );
                DeliveryOutcome::Failed
            }
        },
    };

    let action = if outcome.removes_from_queue() {
        queue.delete(item).await
    } else {
        queue.change_visibility(item, Duration::ZERO).await
    };

    let queue_action_failed = match action {
        Ok(()) => false,
        Err(e) => {
            error!(
                message_id = %item.message_id,
                outcome = outcome.as_str(),
                error = %e,
                "Queue action failed"
            );
            true
        }
    };

    ItemResult {
        outcome,
        queue_action_failed,
    }
}
