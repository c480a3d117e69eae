//! LogBackend - accepts every email and logs a summary via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{ContractError, DeliveryBackend, DeliveryReceipt, Email};
use tracing::{info, instrument};

/// Backend that logs email summaries instead of delivering them
pub struct LogBackend {
    name: String,
    accepted: AtomicU64,
}

impl LogBackend {
    /// Create a new LogBackend with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accepted: AtomicU64::new(0),
        }
    }

    /// Emails accepted so far
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    fn log_email_summary(&self, email: &Email) {
        info!(
            backend = %self.name,
            from = %email.from_header(),
            to = %email.to_header(),
            subject = %email.subject,
            body_len = email.body.len(),
            "Email accepted"
        );
    }
}

impl DeliveryBackend for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_backend_send", skip(self, email), fields(backend = %self.name))]
    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, ContractError> {
        self.log_email_summary(email);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(DeliveryReceipt::accepted("202 Accepted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_backend_send() {
        let backend = LogBackend::new("test_log");
        let email = Email {
            from_email: "a@example.com".into(),
            from_name: "A".into(),
            to_email: "b@example.com".into(),
            to_name: String::new(),
            subject: "s".into(),
            body: "b".into(),
        };

        let receipt = backend.send(&email).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(backend.accepted_count(), 1);
        assert_eq!(backend.name(), "test_log");
    }
}
