//! Layered error definitions
//!
//! Categorized by source: config / sink / stream

use thiserror::Error;

/// Unified error type for configuration and sink I/O
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

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

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

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a failed write attempt to one sink
///
/// Clonable so it can live in the outcome slots and be published to watchers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The sink refused the write because its write side has ended
    #[error("stream not writable")]
    NotWritable { sink_name: String },

    /// The sink accepted the chunk but reported a failure
    #[error("sink '{sink_name}' write error: {message}")]
    Write { sink_name: String, message: String },

    /// The worker driving the sink is gone (panicked or dropped)
    #[error("sink '{sink_name}' worker stopped")]
    WorkerStopped { sink_name: String },
}

impl SinkError {
    pub fn not_writable(sink_name: impl Into<String>) -> Self {
        Self::NotWritable {
            sink_name: sink_name.into(),
        }
    }

    pub fn write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn worker_stopped(sink_name: impl Into<String>) -> Self {
        Self::WorkerStopped {
            sink_name: sink_name.into(),
        }
    }

    /// Name of the sink this outcome belongs to
    pub fn sink_name(&self) -> &str {
        match self {
            Self::NotWritable { sink_name }
            | Self::Write { sink_name, .. }
            | Self::WorkerStopped { sink_name } => sink_name,
        }
    }

    pub fn is_not_writable(&self) -> bool {
        matches!(self, Self::NotWritable { .. })
    }
}

/// Error travelling on a stream's error channel
///
/// Mirrored verbatim from a producer to the fork and from the fork to its sinks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Error raised by a stage, identified by its message
    #[error("{0}")]
    Message(String),

    /// The other end of a pipe is gone
    #[error("stream closed")]
    Closed,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<SinkError> for StreamError {
    fn from(err: SinkError) -> Self {
        Self::Message(err.to_string())
    }
}

/// An error was emitted on a channel nobody listens to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unhandled stream error: {0}")]
pub struct UnhandledError(pub StreamError);

impl UnhandledError {
    pub fn into_inner(self) -> StreamError {
        self.0
    }
}
