//! Mock 投递后端
//!
//! 用于测试与故障演练的 mock 实现，支持运行时切换行为以注入失败场景。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{ContractError, DeliveryBackend, DeliveryReceipt, Email, MockBehavior};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy)]
struct Script {
    behavior: MockBehavior,
    fail_every: u32,
}

/// Mock delivery backend
pub struct MockBackend {
    name: String,
    script: Mutex<Script>,
    latency: Option<Duration>,
    attempts: AtomicU64,
    delivered: Mutex<Vec<Email>>,
}

impl MockBackend {
    /// Backend that accepts everything
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_behavior(name, MockBehavior::Accept)
    }

    /// Backend with the given behaviour
    pub fn with_behavior(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(Script {
                behavior,
                fail_every: 1,
            }),
            latency: None,
            attempts: AtomicU64::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Backend refusing every `n`-th email (`n` of 0 is treated as 1)
    pub fn failing_every(name: impl Into<String>, n: u32) -> Self {
        let backend = Self::with_behavior(name, MockBehavior::FailEvery);
        backend.script().fail_every = n.max(1);
        backend
    }

    /// Delay every send by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Switch behaviour at runtime
    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.script().behavior = behavior;
    }

    /// Send attempts so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Emails accepted so far
    pub fn delivered(&self) -> Vec<Email> {
        self.delivered_guard().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered_guard().len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delivered_guard(&self) -> MutexGuard<'_, Vec<Email>> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accept(&self, email: &Email) -> DeliveryReceipt {
        self.delivered_guard().push(email.clone());
        DeliveryReceipt::accepted("202 Accepted")
    }
}

impl DeliveryBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "mock_backend_send", skip(self, email), fields(backend = %self.name))]
    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, ContractError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let script = *self.script();
        debug!(attempt, behavior = ?script.behavior, "mock send");

        match script.behavior {
            MockBehavior::Accept => Ok(self.accept(email)),
            MockBehavior::Reject => Ok(DeliveryReceipt::rejected("550 rejected by mock")),
            MockBehavior::Error => Err(ContractError::delivery(&self.name, "mock failure")),
            MockBehavior::FailEvery => {
                if attempt % u64::from(script.fail_every) == 0 {
                    Ok(DeliveryReceipt::rejected("550 rejected by mock"))
                } else {
                    Ok(self.accept(email))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[tokio::test]
    async fn test_behaviors() {
        let backend = MockBackend::new("mock");
        assert!(backend.send(&email()).await.unwrap().accepted);

        backend.set_behavior(MockBehavior::Reject);
        assert!(!backend.send(&email()).await.unwrap().accepted);

        backend.set_behavior(MockBehavior::Error);
        assert!(backend.send(&email()).await.is_err());

        assert_eq!(backend.attempts(), 3);
        assert_eq!(backend.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_every() {
        let backend = MockBackend::failing_every("mock", 3);
        let mut accepted = 0;
        for _ in 0..9 {
            if backend.send(&email()).await.unwrap().accepted {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 6);
    }
}
