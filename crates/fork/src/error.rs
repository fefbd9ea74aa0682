//! Fork error types

use thiserror::Error;

/// Fork wiring and construction errors
///
/// Sink write failures never surface here; they are recorded in the
/// fork's write outcomes instead.
#[derive(Debug, Error)]
pub enum ForkError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// A producer is already attached upstream
    #[error("fork already has an upstream producer")]
    AlreadyPiped,

    /// Contract error
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForkError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
