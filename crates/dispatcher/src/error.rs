//! Dispatcher error types

use contracts::BackendId;
use thiserror::Error;

/// Dispatcher-specific errors
///
/// None of these abort an iteration; the sender classifies them into an item
/// outcome and logs them once.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A per-item delivery task panicked or was cancelled
    #[error("delivery task for backend '{backend}' did not complete: {message}")]
    TaskFailed { backend: BackendId, message: String },

    /// The in-flight send limiter was closed
    #[error("send permits closed for backend '{backend}'")]
    PermitsClosed { backend: BackendId },

    /// Error from a collaborator contract
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a task failure error
    pub fn task_failed(backend: BackendId, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            backend,
            message: message.into(),
        }
    }
}
