//! SinkHandle - drives a sink from its own worker task

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument, warn};

use contracts::{Chunk, ChunkSink, SinkError, SinkSignal};

use crate::metrics::SinkMetrics;

/// Write-side state of a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Accepting writes
    Open,
    /// End-of-stream requested, flush/close in progress
    Ending,
    /// Flushed and closed
    Finished,
}

enum SinkCommand {
    Write {
        chunk: Chunk,
        ack: oneshot::Sender<Result<(), SinkError>>,
    },
    Signal {
        signal: SinkSignal,
        ack: oneshot::Sender<()>,
    },
    End,
}

/// Handle to a running sink worker
///
/// Cheap to clone. Every clone talks to the same worker, so the code that
/// created a sink can keep a handle while a fork writes through another.
/// The worker stops once the last clone is dropped.
#[derive(Clone)]
pub struct SinkHandle {
    /// Sink name
    name: Arc<str>,
    /// Channel to send commands to worker
    tx: mpsc::Sender<SinkCommand>,
    /// Shared write-side state
    state: Arc<watch::Sender<SinkState>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: ChunkSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name: Arc<str> = Arc::from(sink.name());
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (state, _) = watch::channel(SinkState::Open);
        let state = Arc::new(state);
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            rx,
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            name: Arc::clone(&name),
            ended: false,
        };
        tokio::spawn(worker.run());

        Self {
            name,
            tx,
            state,
            metrics,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn state(&self) -> SinkState {
        *self.state.borrow()
    }

    /// Whether the sink still accepts writes
    pub fn is_writable(&self) -> bool {
        self.state() == SinkState::Open
    }

    /// Write one chunk and wait for the sink to acknowledge it
    ///
    /// A sink that is not writable is not touched; the attempt resolves to
    /// [`SinkError::NotWritable`] right away.
    pub async fn write(&self, chunk: Chunk) -> Result<(), SinkError> {
        if !self.is_writable() {
            self.metrics.inc_not_writable_count();
            return Err(SinkError::not_writable(&*self.name));
        }

        let (ack, done) = oneshot::channel();
        self.tx
            .send(SinkCommand::Write { chunk, ack })
            .await
            .map_err(|_| SinkError::worker_stopped(&*self.name))?;

        done.await
            .unwrap_or_else(|_| Err(SinkError::worker_stopped(&*self.name)))
    }

    /// Deliver a lifecycle signal, in order with writes
    ///
    /// Returns once the sink has observed it.
    pub async fn signal(&self, signal: SinkSignal) {
        let (ack, done) = oneshot::channel();
        if self
            .tx
            .send(SinkCommand::Signal { signal, ack })
            .await
            .is_err()
        {
            debug!(sink = %self.name, "Signal dropped, worker stopped");
            return;
        }
        let _ = done.await;
    }

    /// Request end-of-stream
    ///
    /// The handle turns not writable immediately; the worker then flushes
    /// and closes the sink. Only the first request takes effect, whoever
    /// makes it. Returns whether this call ended the sink.
    #[instrument(name = "sink_handle_end", skip(self), fields(sink = %self.name))]
    pub async fn end(&self) -> bool {
        let first = self.state.send_if_modified(|state| {
            if *state == SinkState::Open {
                *state = SinkState::Ending;
                true
            } else {
                false
            }
        });
        if !first {
            debug!(sink = %self.name, "End requested on a sink that is already ending");
            return false;
        }

        if self.tx.send(SinkCommand::End).await.is_err() {
            warn!(sink = %self.name, "Sink worker gone before end-of-stream");
        }
        true
    }

    /// Wait until the sink has been flushed and closed
    ///
    /// Never resolves for a sink that is never ended.
    pub async fn finished(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == SinkState::Finished).await;
    }
}

/// Worker task that owns the sink and applies commands in order
struct SinkWorker<S> {
    sink: S,
    rx: mpsc::Receiver<SinkCommand>,
    state: Arc<watch::Sender<SinkState>>,
    metrics: Arc<SinkMetrics>,
    name: Arc<str>,
    /// End-of-stream already ran
    ended: bool,
}

impl<S: ChunkSink> SinkWorker<S> {
    #[instrument(name = "sink_worker_loop", skip(self), fields(sink = %self.name))]
    async fn run(mut self) {
        debug!(sink = %self.name, "Sink worker started");

        while let Some(command) = self.rx.recv().await {
            match command {
                SinkCommand::Write { chunk, ack } => {
                    let result = self.write(&chunk).await;
                    let _ = ack.send(result);
                }
                SinkCommand::Signal { signal, ack } => {
                    self.metrics.inc_signal_count();
                    self.sink.on_signal(&signal);
                    let _ = ack.send(());
                }
                SinkCommand::End => self.finish().await,
            }
        }

        if !self.ended {
            debug!(sink = %self.name, "Sink released without end-of-stream");
        }
        debug!(sink = %self.name, "Sink worker stopped");
    }

    async fn write(&mut self, chunk: &Chunk) -> Result<(), SinkError> {
        if self.ended {
            self.metrics.inc_not_writable_count();
            return Err(SinkError::not_writable(&*self.name));
        }

        let result = match self.sink.write(chunk).await {
            Ok(()) => {
                self.metrics.inc_write_count();
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                warn!(sink = %self.name, bytes = chunk.len(), error = %e, "Write failed");
                Err(SinkError::write(&*self.name, e.to_string()))
            }
        };

        // A sink may end itself from inside a write. The state must flip
        // before the write is acknowledged so the next cycle sees it.
        if !self.sink.is_writable() {
            self.state.send_if_modified(|state| {
                if *state == SinkState::Open {
                    *state = SinkState::Ending;
                    true
                } else {
                    false
                }
            });
            debug!(sink = %self.name, "Sink ended itself");
            self.finish().await;
        }

        result
    }

    async fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        if let Err(e) = self.sink.flush().await {
            warn!(sink = %self.name, error = %e, "Flush failed on end-of-stream");
        }
        if let Err(e) = self.sink.close().await {
            warn!(sink = %self.name, error = %e, "Close failed on end-of-stream");
        }
        self.state.send_replace(SinkState::Finished);

        debug!(sink = %self.name, "Sink finished");
    }
}
