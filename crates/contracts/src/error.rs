//! Layered error definitions
//!
//! Categorized by source: config / queue / delivery / payload

use std::time::Duration;

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Queue Errors =====
    /// Queue does not exist
    #[error("queue not found: {queue}")]
    QueueNotFound { queue: String },

    /// Queue attributes could not be fetched or interpreted
    #[error("queue '{queue}' metadata error: {message}")]
    QueueMetadata { queue: String, message: String },

    /// Receive call failed
    #[error("queue '{queue}' receive error: {message}")]
    QueueReceive { queue: String, message: String },

    /// Delete or visibility change failed
    #[error("queue '{queue}' action '{action}' failed for {receipt_handle}: {message}")]
    QueueAction {
        queue: String,
        action: &'static str,
        receipt_handle: String,
        message: String,
    },

    // ===== Delivery Errors =====
    /// Backend call failed before a status was returned
    #[error("backend '{backend}' delivery error: {message}")]
    Delivery { backend: String, message: String },

    /// Collaborator call exceeded the process-wide client timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    // ===== Payload Errors =====
    /// Queue item payload is not a valid email request
    #[error("payload parse error for message '{message_id}': {message}")]
    PayloadParse { message_id: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create queue metadata error
    pub fn queue_metadata(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueMetadata {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create payload parse error
    pub fn payload_parse(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadParse {
            message_id: message_id.into(),
            message: message.into(),
        }
    }

    /// Create timeout error
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }
}
