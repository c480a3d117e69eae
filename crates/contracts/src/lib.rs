//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate: the queued item and
//! email data model, the queueing and delivery collaborator traits, the relay
//! configuration and the layered error type.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - At-least-once: an item leaves its queue only after a terminal outcome
//! - Retry is driven by the queueing service (visibility reset), never in-process

mod config;
mod delivery;
mod email;
mod error;
mod queue;

pub use config::*;
pub use delivery::*;
pub use email::{Email, EmailRequest};
pub use error::*;
pub use queue::*;
