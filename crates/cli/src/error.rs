//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Seed file could not be loaded into the queue
    #[error("Failed to seed from {path}: {message}")]
    Seed { path: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn seed(path: &Path, message: impl Into<String>) -> Self {
        Self::Seed {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

/// Fail with [`CliError::ConfigNotFound`] when `path` does not exist
pub fn ensure_config_exists(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path))
    }
}
