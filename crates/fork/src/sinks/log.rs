//! LogSink - logs chunk summaries via tracing

use contracts::{Chunk, ChunkSink, ContractError, SinkSignal};
use tracing::{info, instrument, warn};

/// Longest text preview put into a log line
const PREVIEW_CHARS: usize = 32;

/// Sink that logs chunk summaries for debugging
pub struct LogSink {
    name: String,
    chunks: u64,
    bytes: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: 0,
            bytes: 0,
        }
    }

    fn log_chunk_summary(&self, chunk: &Chunk) {
        let preview: String = chunk
            .as_str()
            .map(|text| text.chars().take(PREVIEW_CHARS).collect())
            .unwrap_or_default();

        info!(
            sink = %self.name,
            seq = self.chunks,
            bytes = chunk.len(),
            encoding = %chunk.encoding(),
            preview = %preview.escape_debug(),
            "Chunk received"
        );
    }
}

impl ChunkSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, chunk),
        fields(sink = %self.name, bytes = chunk.len())
    )]
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        self.chunks += 1;
        self.bytes += chunk.len() as u64;
        self.log_chunk_summary(chunk);
        Ok(())
    }

    fn on_signal(&mut self, signal: &SinkSignal) {
        match signal {
            SinkSignal::Error(err) => warn!(sink = %self.name, error = %err, "Error mirrored"),
            other => info!(sink = %self.name, signal = other.name(), "Signal mirrored"),
        }
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            chunks = self.chunks,
            bytes = self.bytes,
            "LogSink closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let result = sink.write(&Chunk::text("abc")).await;
        assert!(result.is_ok());
        assert_eq!(sink.chunks, 1);
        assert_eq!(sink.bytes, 3);
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
