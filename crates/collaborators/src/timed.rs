//! Timed - process-wide client timeout
//!
//! Every collaborator call the relay makes goes through this wrapper, so a
//! hung provider or queue endpoint costs at most one timeout per call.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use contracts::{ContractError, DeliveryBackend, DeliveryReceipt, Email, QueueClient, QueuedItem};

/// Collaborator wrapped with a call timeout
#[derive(Debug, Clone)]
pub struct Timed<T> {
    inner: T,
    timeout: Duration,
}

impl<T> Timed<T> {
    pub fn new(inner: T, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn guard<R>(
        &self,
        operation: impl FnOnce() -> String,
        call: impl Future<Output = Result<R, ContractError>>,
    ) -> Result<R, ContractError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ContractError::timeout(operation(), self.timeout)),
        }
    }
}

impl<T: QueueClient + Sync> QueueClient for Timed<T> {
    async fn queue_attributes(&self, queue: &str) -> Result<HashMap<String, String>, ContractError> {
        self.guard(
            || format!("queue_attributes({queue})"),
            self.inner.queue_attributes(queue),
        )
        .await
    }

    async fn receive(&self, queue: &str, max_items: usize) -> Result<Vec<QueuedItem>, ContractError> {
        self.guard(
            || format!("receive({queue})"),
            self.inner.receive(queue, max_items),
        )
        .await
    }

    async fn delete(&self, item: &QueuedItem) -> Result<(), ContractError> {
        self.guard(
            || format!("delete({}, {})", item.queue, item.message_id),
            self.inner.delete(item),
        )
        .await
    }

    async fn change_visibility(
        &self,
        item: &QueuedItem,
        timeout: Duration,
    ) -> Result<(), ContractError> {
        self.guard(
            || format!("change_visibility({}, {})", item.queue, item.message_id),
            self.inner.change_visibility(item, timeout),
        )
        .await
    }
}

impl<T: DeliveryBackend + Sync> DeliveryBackend for Timed<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, ContractError> {
        self.guard(
            || format!("send via {}", self.inner.name()),
            self.inner.send(email),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockBackend;

    fn email() -> Email {
        Email {
            from_email: "a@example.com".into(),
            from_name: String::new(),
            to_email: "b@example.com".into(),
            to_name: String::new(),
            subject: "s".into(),
            body: "b".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let slow = MockBackend::new("slow").with_latency(Duration::from_secs(60));
        let timed = Timed::new(slow, Duration::from_secs(10));

        let err = timed.send(&email()).await.unwrap_err();
        assert!(matches!(err, ContractError::Timeout { .. }));
        assert!(err.to_string().contains("send via slow"));
        assert_eq!(timed.inner().delivered_count(), 0);
    }

    #[tokio::test]
    async fn test_fast_backend_passes_through() {
        let timed = Timed::new(MockBackend::new("fast"), Duration::from_secs(10));
        assert_eq!(timed.name(), "fast");
        assert!(timed.send(&email()).await.unwrap().accepted);
    }
}
