//! QueueReader - drains every source queue into one batch per iteration

use std::sync::Arc;

use contracts::{QueueClient, QueuedItem, APPROXIMATE_NUMBER_OF_MESSAGES, MAX_ITEMS_PER_RECEIVE};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{reader_count, ReaderConfig, ReaderMetrics};
use crate::error::{IngestionError, Result};

/// Queue reader
///
/// Scales receive parallelism to each queue's reported depth. Receive tasks
/// are spawned only while holding a permit, so at most
/// `max_concurrent_receives` are alive. Every task returns its own items and
/// the reader is the single collector that appends them to the batch.
pub struct QueueReader<Q> {
    client: Arc<Q>,
    config: ReaderConfig,
    permits: Arc<Semaphore>,
    metrics: Arc<ReaderMetrics>,
}

impl<Q> QueueReader<Q>
where
    Q: QueueClient + Sync + 'static,
{
    /// Create a reader over the configured queues
    pub fn new(client: Arc<Q>, config: ReaderConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_receives.max(1)));
        Self {
            client,
            config,
            permits,
            metrics: Arc::new(ReaderMetrics::new()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<ReaderMetrics> {
        self.metrics.clone()
    }

    /// Configured queues
    pub fn queue_urls(&self) -> &[String] {
        &self.config.queue_urls
    }

    /// Read every currently receivable item across all queues
    ///
    /// A queue whose depth cannot be fetched or parsed is skipped for this
    /// call only. Failed receive calls contribute nothing.
    #[instrument(name = "queue_reader_read_batch", skip(self), fields(queues = self.config.queue_urls.len()))]
    pub async fn read_batch(&self) -> Vec<QueuedItem> {
        let mut plan = Vec::with_capacity(self.config.queue_urls.len());
        for queue in &self.config.queue_urls {
            match self.probe_depth(queue).await {
                Ok(depth) => {
                    let readers = reader_count(depth);
                    metrics::gauge!("mail_relay_queue_depth", "queue" => queue.clone())
                        .set(depth as f64);
                    debug!(queue = %queue, depth, readers, "launching receive tasks");
                    plan.push((queue, readers));
                }
                Err(e) => {
                    self.metrics.record_queue_skipped();
                    error!(queue = %queue, error = %e, "Skipping queue for this iteration");
                }
            }
        }

        let mut batch = Vec::new();
        let mut tasks = JoinSet::new();
        for (queue, readers) in plan {
            for _ in 0..readers {
                while let Some(joined) = tasks.try_join_next() {
                    self.absorb(joined, &mut batch);
                }

                // A task is spawned only once it holds a permit
                let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                    self.absorb(Ok(Err(IngestionError::PermitsClosed)), &mut batch);
                    continue;
                };

                let client = Arc::clone(&self.client);
                let queue = queue.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    client
                        .receive(&queue, MAX_ITEMS_PER_RECEIVE)
                        .await
                        .map_err(|source| IngestionError::Receive {
                            queue: queue.clone(),
                            source,
                        })
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.absorb(joined, &mut batch);
        }
        self.metrics.record_batch(batch.len());

        if !batch.is_empty() {
            info!(items = batch.len(), "Batch read");
        }
        batch
    }

    /// Fetch and parse the approximate depth of a queue
    #[instrument(name = "queue_reader_probe_depth", skip(self), fields(queue = %queue))]
    pub async fn probe_depth(&self, queue: &str) -> Result<u64> {
        let attributes = self
            .client
            .queue_attributes(queue)
            .await
            .map_err(|source| IngestionError::DepthFetch {
                queue: queue.to_string(),
                source,
            })?;

        let raw = attributes.get(APPROXIMATE_NUMBER_OF_MESSAGES).ok_or_else(|| {
            IngestionError::DepthMissing {
                queue: queue.to_string(),
            }
        })?;

        raw.trim()
            .parse::<u64>()
            .map_err(|_| IngestionError::DepthParse {
                queue: queue.to_string(),
                value: raw.clone(),
            })
    }

    fn absorb(
        &self,
        joined: std::result::Result<Result<Vec<QueuedItem>>, JoinError>,
        batch: &mut Vec<QueuedItem>,
    ) {
        match joined {
            Ok(Ok(items)) => {
                if let Some(first) = items.first() {
                    metrics::counter!(
                        "mail_relay_items_received_total",
                        "queue" => first.queue.clone()
                    )
                    .increment(items.len() as u64);
                }
                batch.extend(items);
            }
            Ok(Err(e)) => {
                self.metrics.record_receive_failure();
                error!(queue = ?e.queue(), error = %e, "Receive failed");
            }
            Err(e) => {
                self.metrics.record_receive_failure();
                warn!(error = %e, "Receive task aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaborators::{MemoryQueue, MemoryQueueConfig};
    use std::collections::HashSet;

    fn reader(queue: MemoryQueue, queues: &[&str]) -> (Arc<MemoryQueue>, QueueReader<MemoryQueue>) {
        let client = Arc::new(queue);
        let config = ReaderConfig::new(queues.iter().map(|q| q.to_string()).collect());
        (client.clone(), QueueReader::new(client, config))
    }

    #[tokio::test]
    async fn test_reads_everything_visible() {
        let (client, reader) = reader(MemoryQueue::new(["q"]), &["q"]);
        for i in 0..37 {
            client.enqueue("q", format!("{i}")).unwrap();
        }

        let batch = reader.read_batch().await;
        assert_eq!(batch.len(), 37);
        assert_eq!(client.visible_len("q"), 0);
        assert_eq!(client.in_flight_len("q"), 37);

        let ids: HashSet<_> = batch.iter().map(|item| item.message_id.clone()).collect();
        assert_eq!(ids.len(), 37);
    }

    #[tokio::test]
    async fn test_small_queue_still_gets_a_reader() {
        let (client, reader) = reader(MemoryQueue::new(["q"]), &["q"]);
        for i in 0..3 {
            client.enqueue("q", format!("{i}")).unwrap();
        }

        assert_eq!(reader.read_batch().await.len(), 3);
    }

    #[tokio::test]
    async fn test_merges_multiple_queues() {
        let (client, reader) = reader(MemoryQueue::new(["a", "b"]), &["a", "b"]);
        for i in 0..12 {
            client.enqueue("a", format!("a{i}")).unwrap();
        }
        for i in 0..4 {
            client.enqueue("b", format!("b{i}")).unwrap();
        }

        let batch = reader.read_batch().await;
        assert_eq!(batch.len(), 16);
        assert_eq!(batch.iter().filter(|item| item.queue == "a").count(), 12);
        assert_eq!(batch.iter().filter(|item| item.queue == "b").count(), 4);
    }

    #[tokio::test]
    async fn test_metadata_failure_skips_only_that_queue() {
        let config = MemoryQueueConfig {
            fail_attributes: HashSet::from(["broken".to_string()]),
            garbled_depth: HashSet::from(["garbled".to_string()]),
            ..Default::default()
        };
        let (client, reader) = reader(
            MemoryQueue::with_config(["broken", "garbled", "ok"], config),
            &["broken", "garbled", "ok"],
        );
        client.enqueue("broken", "x").unwrap();
        client.enqueue("garbled", "y").unwrap();
        client.enqueue("ok", "z").unwrap();

        let batch = reader.read_batch().await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].queue, "ok");
        assert_eq!(client.visible_len("broken"), 1);
        assert_eq!(client.visible_len("garbled"), 1);

        let snapshot = reader.metrics().snapshot();
        assert_eq!(snapshot.queues_skipped, 2);
        assert_eq!(snapshot.items_received, 1);
    }

    #[tokio::test]
    async fn test_probe_depth_errors() {
        let config = MemoryQueueConfig {
            garbled_depth: HashSet::from(["garbled".to_string()]),
            ..Default::default()
        };
        let (_, reader) = reader(MemoryQueue::with_config(["garbled"], config), &["garbled"]);

        assert!(matches!(
            reader.probe_depth("garbled").await,
            Err(IngestionError::DepthParse { .. })
        ));
        assert!(matches!(
            reader.probe_depth("missing").await,
            Err(IngestionError::DepthFetch { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_receive_tasks_never_exceed_cap() {
        let config = MemoryQueueConfig {
            receive_latency: std::time::Duration::from_millis(100),
            ..Default::default()
        };
        let client = Arc::new(MemoryQueue::with_config(["q"], config));
        for i in 0..300 {
            client.enqueue("q", format!("{i}")).unwrap();
        }
        let reader = QueueReader::new(
            client.clone(),
            ReaderConfig {
                max_concurrent_receives: 3,
                ..ReaderConfig::new(vec!["q".to_string()])
            },
        );
        let baseline = tokio::runtime::Handle::current().metrics().num_alive_tasks();

        let reading = tokio::spawn(async move { reader.read_batch().await });
        for _ in 0..5 {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            let alive = tokio::runtime::Handle::current().metrics().num_alive_tasks();
            // the driving task plus at most three receives
            assert!(alive <= baseline + 4, "alive tasks: {alive}");
        }

        let batch = reading.await.unwrap();
        assert_eq!(batch.len(), 300);
        assert_eq!(client.in_flight_len("q"), 300);
    }

    #[tokio::test]
    async fn test_empty_queue_yields_empty_batch() {
        let (_, reader) = reader(MemoryQueue::new(["q"]), &["q"]);
        assert!(reader.read_batch().await.is_empty());
        assert_eq!(reader.metrics().snapshot().batches, 1);
    }
}
