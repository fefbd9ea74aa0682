//! Error types for CLI operations.

use std::path::PathBuf;

use contracts::UnhandledError;
use fork::ForkError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Input could not be opened
    #[error("Failed to open input {}: {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input failed and nobody listened for the error
    #[error("Input failed: {0}")]
    Unhandled(#[from] UnhandledError),

    /// Fork could not be wired up
    #[error("Failed to set up fork: {0}")]
    Fork(#[from] ForkError),

    /// Pipeline task panicked or was cancelled
    #[error("Pipeline task failed: {message}")]
    Task { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn input_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputOpen {
            path: path.into(),
            source,
        }
    }

    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
