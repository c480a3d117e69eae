//! QueueClient trait - queueing service interface
//!
//! The relay consumes this contract; the wire-level SDK lives behind it.

use std::collections::HashMap;
use std::time::Duration;

use crate::ContractError;

/// Maximum items a single receive call may return
pub const MAX_ITEMS_PER_RECEIVE: usize = 10;

/// Attribute carrying the approximate number of visible items
pub const APPROXIMATE_NUMBER_OF_MESSAGES: &str = "ApproximateNumberOfMessages";

/// An item received from a source queue
///
/// Owned by exactly one sender per iteration, which performs the terminal
/// queue action (delete or visibility reset) and then drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedItem {
    /// Source queue identifier
    pub queue: String,

    /// Service-assigned message id (stable across redeliveries)
    pub message_id: String,

    /// Per-receive token required to delete or change visibility
    pub receipt_handle: String,

    /// Raw payload
    pub body: String,
}

/// Queueing service trait
#[trait_variant::make(QueueClient: Send)]
pub trait LocalQueueClient {
    /// Fetch queue attributes
    ///
    /// The approximate depth is reported under [`APPROXIMATE_NUMBER_OF_MESSAGES`]
    /// as a decimal string.
    async fn queue_attributes(&self, queue: &str) -> Result<HashMap<String, String>, ContractError>;

    /// Receive up to `max_items` (at most [`MAX_ITEMS_PER_RECEIVE`]) visible items
    async fn receive(&self, queue: &str, max_items: usize)
        -> Result<Vec<QueuedItem>, ContractError>;

    /// Remove an item permanently
    async fn delete(&self, item: &QueuedItem) -> Result<(), ContractError>;

    /// Change how long the item stays invisible
    ///
    /// `Duration::ZERO` makes it immediately re-receivable.
    async fn change_visibility(
        &self,
        item: &QueuedItem,
        timeout: Duration,
    ) -> Result<(), ContractError>;
}
