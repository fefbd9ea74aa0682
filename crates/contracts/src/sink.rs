//! ChunkSink trait - fork output interface
//!
//! Defines the capability set every fork destination must provide.

use crate::{Chunk, ContractError, StreamError};

/// Lifecycle signal mirrored from the fork onto its sinks
///
/// Signals are notifications only; none of them closes a sink by itself.
/// End-of-stream is a separate capability (`flush` + `close`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSignal {
    /// An error was raised on the fork
    Error(StreamError),
    /// The fork was closed
    Close,
    /// The fork's readable side ended
    End,
}

impl SinkSignal {
    /// Event name (used for logging/metrics)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Close => "close",
            Self::End => "end",
        }
    }
}

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(ChunkSink: Send)]
pub trait LocalChunkSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Whether the sink still accepts writes
    ///
    /// A sink that ends itself reports `false` from here on; its worker then
    /// runs end-of-stream and refuses further writes.
    fn is_writable(&self) -> bool {
        true
    }

    /// Write one chunk
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError>;

    /// Observe a mirrored lifecycle signal
    fn on_signal(&mut self, signal: &SinkSignal) {
        let _ = signal;
    }

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
