//! DeliveryBackend trait - email provider interface

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContractError, Email};

/// Slot of a delivery backend in the relay
///
/// `A` holds tie-break priority when a batch has a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BackendId {
    A,
    B,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of a delivery attempt that reached the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Provider accepted the email for delivery
    pub accepted: bool,

    /// Provider status line (for logs)
    pub status: String,
}

impl DeliveryReceipt {
    pub fn accepted(status: impl Into<String>) -> Self {
        Self {
            accepted: true,
            status: status.into(),
        }
    }

    pub fn rejected(status: impl Into<String>) -> Self {
        Self {
            accepted: false,
            status: status.into(),
        }
    }
}

/// Email delivery trait
///
/// Both backends implement this trait; the relay is generic over it.
#[trait_variant::make(DeliveryBackend: Send)]
pub trait LocalDeliveryBackend {
    /// Backend name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Hand one email to the provider
    ///
    /// # Errors
    /// Returns an error when the provider could not be reached or answered
    /// with something unusable. A reachable provider refusing the email is
    /// reported as `Ok` with `accepted == false`.
    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, ContractError>;
}
