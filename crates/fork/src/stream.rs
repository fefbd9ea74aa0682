//! Pipe plumbing between pipeline stages
//!
//! A pipe is a bounded chunk channel plus the producer's error channel.
//! The channel capacity is the buffering threshold: a writer suspends while
//! the pipe is full, which is how back-pressure travels upstream.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use contracts::{Chunk, StreamError, UnhandledError};
use futures::Stream;
use tokio::sync::mpsc;

pub use tokio::sync::mpsc::error::TryRecvError;

/// Error channel of a pipeline stage
///
/// Every listener gets its own unbounded queue, so an error is never lost
/// while a listener is busy (e.g. a fork parked on a slow barrier).
/// Emitting onto an emitter nobody listens to fails with [`UnhandledError`];
/// the emitter is expected to treat that as fatal.
#[derive(Debug, Clone, Default)]
pub struct ErrorEmitter {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<StreamError>>>>,
}

impl ErrorEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `err` to every current listener
    ///
    /// Returns the number of listeners reached. Dropped listeners are pruned.
    pub fn emit(&self, err: StreamError) -> Result<usize, UnhandledError> {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|tx| tx.send(err.clone()).is_ok());
        match listeners.len() {
            0 => Err(UnhandledError(err)),
            reached => Ok(reached),
        }
    }

    /// Listen to errors emitted from now on
    pub fn subscribe(&self) -> ErrorListener {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        ErrorListener { rx }
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

/// Receiving end of an [`ErrorEmitter`] subscription
#[derive(Debug)]
pub struct ErrorListener {
    rx: mpsc::UnboundedReceiver<StreamError>,
}

impl ErrorListener {
    /// Next error, or `None` once every emitter is gone
    pub async fn recv(&mut self) -> Option<StreamError> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<StreamError, TryRecvError> {
        self.rx.try_recv()
    }
}

/// Create a pipe with a fresh error channel
pub fn channel(capacity: usize) -> (StreamWriter, StreamReader) {
    channel_with_errors(capacity, ErrorEmitter::new())
}

/// Create a pipe whose error channel is `errors`
pub fn channel_with_errors(capacity: usize, errors: ErrorEmitter) -> (StreamWriter, StreamReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        StreamWriter {
            tx,
            errors: errors.clone(),
        },
        StreamReader { rx, errors },
    )
}

/// Producer side of a pipe
///
/// The stream ends once every clone of the writer is dropped.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    tx: mpsc::Sender<Chunk>,
    errors: ErrorEmitter,
}

impl StreamWriter {
    /// Write one chunk, waiting for room in the pipe
    ///
    /// # Errors
    /// [`StreamError::Closed`] once the reader is gone.
    pub async fn write(&self, chunk: impl Into<Chunk>) -> Result<(), StreamError> {
        self.tx
            .send(chunk.into())
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Raise an error on this stage's error channel
    pub fn emit_error(&self, err: StreamError) -> Result<usize, UnhandledError> {
        self.errors.emit(err)
    }

    pub fn errors(&self) -> &ErrorEmitter {
        &self.errors
    }

    /// Whether the reader has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// End the stream from this writer's side
    pub fn end(self) {}
}

/// Consumer side of a pipe
#[derive(Debug)]
pub struct StreamReader {
    rx: mpsc::Receiver<Chunk>,
    errors: ErrorEmitter,
}

impl StreamReader {
    /// Next chunk, or `None` once every writer has ended
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Error channel of the producer feeding this pipe
    pub fn errors(&self) -> &ErrorEmitter {
        &self.errors
    }

    /// Stop accepting chunks; pending writers fail with [`StreamError::Closed`]
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for StreamReader {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        self.rx.poll_recv(cx)
    }
}
