//! In-memory queueing service
//!
//! Models the parts of a hosted queue the relay depends on: approximate depth,
//! batched receive, receipt handles, delete, and a visibility window after
//! which unacknowledged items become receivable again. Supports injecting
//! metadata failures for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    ContractError, Email, QueueClient, QueuedItem, APPROXIMATE_NUMBER_OF_MESSAGES,
    MAX_ITEMS_PER_RECEIVE,
};
use tokio::time::Instant;
use tracing::{debug, instrument};

/// In-memory queue configuration
#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    /// How long a received item stays invisible unless deleted or reset
    pub visibility_timeout: Duration,
    /// Queues whose attribute fetch should fail
    pub fail_attributes: HashSet<String>,
    /// Queues whose depth attribute should be unparseable
    pub garbled_depth: HashSet<String>,
    /// Simulated round-trip time of each receive call
    pub receive_latency: Duration,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            fail_attributes: HashSet::new(),
            garbled_depth: HashSet::new(),
            receive_latency: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    visible: VecDeque<StoredMessage>,
    in_flight: HashMap<String, InFlight>,
    deleted: u64,
}

impl QueueState {
    /// Return items whose visibility window has lapsed
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some(entry) = self.in_flight.remove(&handle) {
                self.visible.push_back(entry.message);
            }
        }
    }
}

/// In-memory queueing service
pub struct MemoryQueue {
    config: MemoryQueueConfig,
    queues: Mutex<HashMap<String, QueueState>>,
    next_message_id: AtomicU64,
    next_receipt: AtomicU64,
}

impl MemoryQueue {
    /// Create a service hosting the given queues
    pub fn new<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(queues, MemoryQueueConfig::default())
    }

    /// Create with configuration (can inject failure scenarios)
    pub fn with_config<I, S>(queues: I, config: MemoryQueueConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queues = queues
            .into_iter()
            .map(|name| (name.into(), QueueState::default()))
            .collect();

        Self {
            config,
            queues: Mutex::new(queues),
            next_message_id: AtomicU64::new(1),
            next_receipt: AtomicU64::new(1),
        }
    }

    /// Append a raw payload, returning its message id
    pub fn enqueue(&self, queue: &str, body: impl Into<String>) -> Result<String, ContractError> {
        let message_id = format!(
            "msg-{}",
            self.next_message_id.fetch_add(1, Ordering::Relaxed)
        );
        let mut queues = self.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| ContractError::QueueNotFound {
                queue: queue.to_string(),
            })?;

        state.visible.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: body.into(),
            receive_count: 0,
        });
        Ok(message_id)
    }

    /// Append an email wrapped in the standard payload envelope
    pub fn enqueue_email(&self, queue: &str, email: &Email) -> Result<String, ContractError> {
        self.enqueue(queue, email.to_payload()?)
    }

    /// Items currently receivable
    pub fn visible_len(&self, queue: &str) -> usize {
        self.lock()
            .get(queue)
            .map(|state| state.visible.len())
            .unwrap_or(0)
    }

    /// Items received but not yet deleted or returned
    pub fn in_flight_len(&self, queue: &str) -> usize {
        self.lock()
            .get(queue)
            .map(|state| state.in_flight.len())
            .unwrap_or(0)
    }

    /// Items deleted so far
    pub fn deleted_count(&self, queue: &str) -> u64 {
        self.lock()
            .get(queue)
            .map(|state| state.deleted)
            .unwrap_or(0)
    }

    /// Times the given message has been received (0 if unknown or deleted)
    pub fn receive_count(&self, queue: &str, message_id: &str) -> u32 {
        let queues = self.lock();
        let Some(state) = queues.get(queue) else {
            return 0;
        };
        state
            .visible
            .iter()
            .chain(state.in_flight.values().map(|entry| &entry.message))
            .find(|message| message.message_id == message_id)
            .map(|message| message.receive_count)
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, QueueState>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_receipt(&self, queue: &str) -> String {
        format!(
            "{queue}#rh-{}",
            self.next_receipt.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn action_error(item: &QueuedItem, action: &'static str, message: &str) -> ContractError {
        ContractError::QueueAction {
            queue: item.queue.clone(),
            action,
            receipt_handle: item.receipt_handle.clone(),
            message: message.to_string(),
        }
    }
}

impl QueueClient for MemoryQueue {
    #[instrument(name = "memory_queue_attributes", skip(self), fields(queue = %queue))]
    async fn queue_attributes(&self, queue: &str) -> Result<HashMap<String, String>, ContractError> {
        if self.config.fail_attributes.contains(queue) {
            return Err(ContractError::queue_metadata(queue, "injected failure"));
        }

        let mut queues = self.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| ContractError::QueueNotFound {
                queue: queue.to_string(),
            })?;
        state.release_expired(Instant::now());

        let depth = if self.config.garbled_depth.contains(queue) {
            "many".to_string()
        } else {
            state.visible.len().to_string()
        };

        let mut attributes = HashMap::new();
        attributes.insert(APPROXIMATE_NUMBER_OF_MESSAGES.to_string(), depth);
        Ok(attributes)
    }

    #[instrument(name = "memory_queue_receive", skip(self), fields(queue = %queue, max_items))]
    async fn receive(&self, queue: &str, max_items: usize) -> Result<Vec<QueuedItem>, ContractError> {
        if !self.config.receive_latency.is_zero() {
            tokio::time::sleep(self.config.receive_latency).await;
        }
        let max_items = max_items.min(MAX_ITEMS_PER_RECEIVE);
        let now = Instant::now();

        let mut queues = self.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| ContractError::QueueReceive {
                queue: queue.to_string(),
                message: "queue does not exist".into(),
            })?;
        state.release_expired(now);

        let mut items = Vec::with_capacity(max_items.min(state.visible.len()));
        while items.len() < max_items {
            let Some(mut message) = state.visible.pop_front() else {
                break;
            };
            message.receive_count += 1;

            let receipt_handle = self.allocate_receipt(queue);
            items.push(QueuedItem {
                queue: queue.to_string(),
                message_id: message.message_id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: message.body.clone(),
            });
            state.in_flight.insert(
                receipt_handle,
                InFlight {
                    message,
                    visible_at: now + self.config.visibility_timeout,
                },
            );
        }

        debug!(queue = %queue, received = items.len(), "received items");
        Ok(items)
    }

    #[instrument(
        name = "memory_queue_delete",
        skip(self, item),
        fields(queue = %item.queue, message_id = %item.message_id)
    )]
    async fn delete(&self, item: &QueuedItem) -> Result<(), ContractError> {
        let mut queues = self.lock();
        let state = queues
            .get_mut(&item.queue)
            .ok_or_else(|| Self::action_error(item, "delete", "queue does not exist"))?;

        state
            .in_flight
            .remove(&item.receipt_handle)
            .ok_or_else(|| Self::action_error(item, "delete", "receipt handle is not in flight"))?;
        state.deleted += 1;
        Ok(())
    }

    #[instrument(
        name = "memory_queue_change_visibility",
        skip(self, item),
        fields(queue = %item.queue, message_id = %item.message_id, timeout_ms = timeout.as_millis() as u64)
    )]
    async fn change_visibility(
        &self,
        item: &QueuedItem,
        timeout: Duration,
    ) -> Result<(), ContractError> {
        let mut queues = self.lock();
        let state = queues.get_mut(&item.queue).ok_or_else(|| {
            Self::action_error(item, "change_visibility", "queue does not exist")
        })?;

        if timeout.is_zero() {
            let entry = state.in_flight.remove(&item.receipt_handle).ok_or_else(|| {
                Self::action_error(item, "change_visibility", "receipt handle is not in flight")
            })?;
            state.visible.push_back(entry.message);
        } else {
            let entry = state.in_flight.get_mut(&item.receipt_handle).ok_or_else(|| {
                Self::action_error(item, "change_visibility", "receipt handle is not in flight")
            })?;
            entry.visible_at = Instant::now() + timeout;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(attributes: &HashMap<String, String>) -> &str {
        attributes
            .get(APPROXIMATE_NUMBER_OF_MESSAGES)
            .map(String::as_str)
            .unwrap()
    }

    #[tokio::test]
    async fn test_receive_is_capped_per_call() {
        let queue = MemoryQueue::new(["q"]);
        for i in 0..25 {
            queue.enqueue("q", format!("body-{i}")).unwrap();
        }

        let items = queue.receive("q", 50).await.unwrap();
        assert_eq!(items.len(), MAX_ITEMS_PER_RECEIVE);
        assert_eq!(items[0].body, "body-0");
        assert_eq!(queue.visible_len("q"), 15);
        assert_eq!(queue.in_flight_len("q"), 10);

        let attributes = queue.queue_attributes("q").await.unwrap();
        assert_eq!(depth(&attributes), "15");
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let queue = MemoryQueue::new(["q"]);
        queue.enqueue("q", "one").unwrap();
        queue.enqueue("q", "two").unwrap();

        let items = queue.receive("q", 10).await.unwrap();
        queue.delete(&items[0]).await.unwrap();
        queue
            .change_visibility(&items[1], Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(queue.deleted_count("q"), 1);
        assert_eq!(queue.in_flight_len("q"), 0);
        assert_eq!(queue.visible_len("q"), 1);

        let again = queue.receive("q", 10).await.unwrap();
        assert_eq!(again[0].message_id, items[1].message_id);
        assert_ne!(again[0].receipt_handle, items[1].receipt_handle);
        assert_eq!(queue.receive_count("q", &items[1].message_id), 2);
    }

    #[tokio::test]
    async fn test_stale_receipt_rejected() {
        let queue = MemoryQueue::new(["q"]);
        queue.enqueue("q", "one").unwrap();

        let items = queue.receive("q", 1).await.unwrap();
        queue.delete(&items[0]).await.unwrap();
        let err = queue.delete(&items[0]).await.unwrap_err();
        assert!(matches!(err, ContractError::QueueAction { action: "delete", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_window_expires() {
        let config = MemoryQueueConfig {
            visibility_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let queue = MemoryQueue::with_config(["q"], config);
        queue.enqueue("q", "one").unwrap();

        assert_eq!(queue.receive("q", 10).await.unwrap().len(), 1);
        assert!(queue.receive("q", 10).await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(queue.receive("q", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_metadata_failures() {
        let config = MemoryQueueConfig {
            fail_attributes: HashSet::from(["broken".to_string()]),
            garbled_depth: HashSet::from(["garbled".to_string()]),
            ..Default::default()
        };
        let queue = MemoryQueue::with_config(["broken", "garbled"], config);

        assert!(queue.queue_attributes("broken").await.is_err());
        let attributes = queue.queue_attributes("garbled").await.unwrap();
        assert!(depth(&attributes).parse::<u64>().is_err());
    }

    #[tokio::test]
    async fn test_unknown_queue() {
        let queue = MemoryQueue::new(["q"]);
        assert!(queue.enqueue("missing", "x").is_err());
        assert!(queue.queue_attributes("missing").await.is_err());
        assert!(queue.receive("missing", 10).await.is_err());
    }
}
