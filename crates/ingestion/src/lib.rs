//! # Ingestion
//!
//! Queue draining module.
//!
//! Responsibilities:
//! - Probe the approximate depth of every source queue
//! - Scale receive parallelism to that depth (capped per queue)
//! - Merge all received items into one batch per iteration
//! - Skip, for one iteration, queues whose depth is unavailable
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{QueueReader, ReaderConfig};
//!
//! let reader = QueueReader::new(client, ReaderConfig::new(vec!["emails".into()]));
//! let batch = reader.read_batch().await;
//! ```

mod config;
mod error;
mod reader;

// Re-exports
pub use config::{reader_count, MetricsSnapshot, ReaderConfig, ReaderMetrics, MAX_ITEMS_PER_QUEUE};
pub use contracts::QueuedItem;
pub use error::{IngestionError, Result};
pub use reader::QueueReader;
