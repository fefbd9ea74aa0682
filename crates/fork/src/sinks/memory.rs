//! MemorySink - accumulates chunks and signals in memory

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::{Chunk, ChunkSink, ContractError, SinkSignal, StreamError};
use tokio::time::sleep;

#[derive(Debug, Default)]
struct MemoryState {
    chunks: Vec<Chunk>,
    signals: Vec<SinkSignal>,
    flushed: bool,
    closed: bool,
    finished_at: Option<Instant>,
}

/// Sink that keeps everything it receives
///
/// Inspect what arrived through a [`MemorySinkProbe`] taken before the sink
/// is handed to a worker.
#[derive(Debug)]
pub struct MemorySink {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    write_delay: Option<Duration>,
    flush_delay: Option<Duration>,
    end_after: Option<usize>,
    failing_writes: HashSet<usize>,
    attempts: usize,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
            write_delay: None,
            flush_delay: None,
            end_after: None,
            failing_writes: HashSet::new(),
            attempts: 0,
        }
    }

    /// Delay every write acknowledgement
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Delay end-of-stream flushing
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = Some(delay);
        self
    }

    /// End the sink by itself after `writes` write attempts
    pub fn end_after(mut self, writes: usize) -> Self {
        self.end_after = Some(writes);
        self
    }

    /// Fail the write attempt with this zero-based index
    pub fn fail_write(mut self, attempt: usize) -> Self {
        self.failing_writes.insert(attempt);
        self
    }

    pub fn probe(&self) -> MemorySinkProbe {
        MemorySinkProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChunkSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        match self.end_after {
            Some(limit) => self.attempts < limit,
            None => true,
        }
    }

    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        let attempt = self.attempts;
        self.attempts += 1;

        if let Some(delay) = self.write_delay {
            sleep(delay).await;
        }
        if self.failing_writes.contains(&attempt) {
            return Err(ContractError::sink_write(
                &self.name,
                format!("write #{attempt} rejected"),
            ));
        }

        self.state().chunks.push(chunk.clone());
        Ok(())
    }

    fn on_signal(&mut self, signal: &SinkSignal) {
        self.state().signals.push(signal.clone());
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(delay) = self.flush_delay {
            sleep(delay).await;
        }
        let mut state = self.state();
        state.flushed = true;
        state.finished_at = Some(Instant::now());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.state().closed = true;
        Ok(())
    }
}

/// Read-only view of what a [`MemorySink`] received
#[derive(Debug, Clone)]
pub struct MemorySinkProbe {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySinkProbe {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.state().chunks.clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.state().chunks.len()
    }

    /// All received bytes, concatenated
    pub fn contents(&self) -> Vec<u8> {
        self.state()
            .chunks
            .iter()
            .flat_map(|chunk| chunk.data().iter().copied())
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn signals(&self) -> Vec<SinkSignal> {
        self.state().signals.clone()
    }

    /// Errors mirrored onto the sink
    pub fn errors(&self) -> Vec<StreamError> {
        self.state()
            .signals
            .iter()
            .filter_map(|signal| match signal {
                SinkSignal::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_flushed(&self) -> bool {
        self.state().flushed
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// When end-of-stream flushing completed
    pub fn finished_at(&self) -> Option<Instant> {
        self.state().finished_at
    }
}
