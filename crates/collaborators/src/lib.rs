//! # Collaborators
//!
//! Concrete implementations of the external contracts the relay consumes.
//!
//! Responsibilities:
//! - In-memory queueing service with visibility semantics (`MemoryQueue`)
//! - Delivery backends: logging and scripted mock
//! - Process-wide client timeout for every collaborator call (`Timed`)
//! - Build backends from `BackendConfig`
//!
//! The wire-level provider SDKs plug in behind the same traits.

pub mod factory;
pub mod log_backend;
pub mod memory_queue;
pub mod mock_backend;
pub mod timed;

pub use contracts::{DeliveryBackend, QueueClient};
pub use factory::{build_backend, ConfiguredBackend};
pub use log_backend::LogBackend;
pub use memory_queue::{MemoryQueue, MemoryQueueConfig};
pub use mock_backend::MockBackend;
pub use timed::Timed;
