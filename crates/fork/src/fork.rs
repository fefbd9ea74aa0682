//! Fork - pass-through stage that tees every chunk into a set of sinks

use std::time::Instant;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{Chunk, ChunkSink, ForkOptions, SinkConfig, SinkType, StreamError};
use observability::{
    record_barrier_latency_ms, record_chunk_forwarded, record_signal_mirrored, record_sink_write,
    RunningStats, StatsSummary,
};

use crate::error::ForkError;
use crate::handle::SinkHandle;
use crate::lifecycle::{Action, Lifecycle, LifecycleEvent};
use crate::metrics::MetricsSnapshot;
use crate::outcomes::WriteOutcomes;
use crate::sinks::{FileSink, LogSink, NetworkSink};
use crate::stream::{self, ErrorEmitter, ErrorListener, StreamReader, StreamWriter};

/// How a fork run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Upstream ran dry; sinks were ended and signalled
    Finished,
    /// Downstream stopped accepting chunks; sinks were left as they were
    DownstreamClosed,
}

/// Summary of a completed fork run
#[derive(Debug, Clone)]
pub struct ForkReport {
    /// Chunks passed through
    pub chunks: u64,
    /// Bytes passed through
    pub bytes: u64,
    /// Last recorded write outcome per sink
    pub outcomes: WriteOutcomes,
    /// Per-sink metrics, in sink order
    pub sinks: Vec<(String, MetricsSnapshot)>,
    /// Time spent waiting on each fan-out barrier
    pub barrier_latency_ms: StatsSummary,
    pub termination: Termination,
}

enum Flow {
    Continue,
    DownstreamClosed,
}

/// The fork operator
///
/// Sits between an upstream producer and an optional downstream consumer.
/// Every chunk is written to all sinks concurrently; the chunk is forwarded
/// downstream only once every write has settled, and the next chunk is not
/// pulled before that. A sink that never acknowledges a write stalls the
/// whole pipeline; there is no timeout.
pub struct Fork {
    sinks: Vec<SinkHandle>,
    options: ForkOptions,
    outcomes: watch::Sender<WriteOutcomes>,
    /// The fork's own error channel
    errors: ErrorEmitter,
    /// Internal subscription on `errors` that mirrors them onto the sinks
    mirror_rx: Option<ErrorListener>,
    upstream: Option<StreamReader>,
    upstream_errors: Option<ErrorListener>,
    downstream: Option<StreamWriter>,
    lifecycle: Lifecycle,
    chunks: u64,
    bytes: u64,
    barrier_stats: RunningStats,
}

impl std::fmt::Debug for Fork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fork")
            .field("sinks", &self.sinks)
            .field("options", &self.options)
            .field("piped", &self.upstream.is_some())
            .field("chunks", &self.chunks)
            .finish()
    }
}

impl Fork {
    /// Create a fork over `sinks`
    ///
    /// Subscribes the error mirror right away; performs no I/O.
    pub fn new(sinks: Vec<SinkHandle>, options: ForkOptions) -> Self {
        let errors = ErrorEmitter::new();
        let mirror_rx = Some(errors.subscribe());
        let (outcomes, _) = watch::channel(WriteOutcomes::new(sinks.len()));

        Self {
            sinks,
            options,
            outcomes,
            errors,
            mirror_rx,
            upstream: None,
            upstream_errors: None,
            downstream: None,
            lifecycle: Lifecycle::new(),
            chunks: 0,
            bytes: 0,
            barrier_stats: RunningStats::default(),
        }
    }

    /// Same as [`Fork::new`]
    pub fn fork(sinks: Vec<SinkHandle>, options: ForkOptions) -> Self {
        Self::new(sinks, options)
    }

    pub fn sinks(&self) -> &[SinkHandle] {
        &self.sinks
    }

    pub fn options(&self) -> &ForkOptions {
        &self.options
    }

    /// The fork's own error channel
    ///
    /// Subscribe to observe errors raised on the fork, or emit onto it.
    /// Every error emitted here is also mirrored onto every sink.
    pub fn errors(&self) -> &ErrorEmitter {
        &self.errors
    }

    /// Live view of the last recorded write outcome per sink
    pub fn outcomes(&self) -> watch::Receiver<WriteOutcomes> {
        self.outcomes.subscribe()
    }

    /// Attach the upstream producer
    ///
    /// Unless `pass_error` is off, errors the producer emits are relayed
    /// onto the fork's own error channel.
    pub fn pipe_from(&mut self, upstream: StreamReader) -> Result<(), ForkError> {
        if self.upstream.is_some() {
            return Err(ForkError::AlreadyPiped);
        }

        let event = LifecycleEvent::Piped(upstream.errors().clone());
        match self.lifecycle.route(event, &self.options) {
            Action::Relay(rx) => self.upstream_errors = Some(rx),
            _ => debug!("Upstream errors are not relayed"),
        }
        self.upstream = Some(upstream);
        Ok(())
    }

    /// Create the downstream pipe
    ///
    /// The returned reader carries the fork's error channel, so a further
    /// stage can subscribe to it. Without a downstream, chunks are dropped
    /// after fan-out.
    pub fn pipe_to(&mut self) -> StreamReader {
        let (writer, reader) =
            stream::channel_with_errors(self.options.high_water_mark, self.errors.clone());
        if self.downstream.replace(writer).is_some() {
            warn!("Replacing existing downstream pipe");
        }
        reader
    }

    /// Run the fork until upstream ends or downstream goes away
    #[instrument(name = "fork_run", skip(self), fields(sinks = self.sinks.len()))]
    pub async fn run(mut self) -> ForkReport {
        info!(
            sinks = self.sinks.len(),
            pass_error = self.options.pass_error,
            "Fork started"
        );

        let termination = match self.upstream.take() {
            Some(upstream) => self.pump(upstream).await,
            None => {
                warn!("Fork has no upstream, finishing immediately");
                Termination::Finished
            }
        };
        self.drain_errors().await;

        match termination {
            Termination::Finished => self.terminate().await,
            Termination::DownstreamClosed => {
                info!(chunks = self.chunks, "Downstream closed, fork stopped pulling input");
            }
        }

        let report = self.report(termination);
        info!(
            chunks = report.chunks,
            bytes = report.bytes,
            failed_sinks = report.outcomes.failures().count(),
            "Fork finished"
        );
        report
    }

    /// Spawn the fork as a background task
    pub fn spawn(self) -> JoinHandle<ForkReport> {
        tokio::spawn(self.run())
    }

    async fn pump(&mut self, mut upstream: StreamReader) -> Termination {
        loop {
            tokio::select! {
                biased;
                err = next_error(&mut self.mirror_rx) => {
                    self.dispatch(LifecycleEvent::Error(err)).await;
                }
                err = next_error(&mut self.upstream_errors) => self.relay(err),
                chunk = upstream.recv() => match chunk {
                    Some(chunk) => {
                        if let Flow::DownstreamClosed = self.transform(chunk).await {
                            return Termination::DownstreamClosed;
                        }
                    }
                    None => return Termination::Finished,
                },
            }
        }
    }

    #[instrument(name = "fork_transform", skip(self, chunk), fields(seq = self.chunks, bytes = chunk.len()))]
    async fn transform(&mut self, chunk: Chunk) -> Flow {
        let started = Instant::now();

        // every write starts before any is awaited; the barrier waits for all of them
        let results = join_all(self.sinks.iter().map(|sink| sink.write(chunk.clone()))).await;

        for (sink, result) in self.sinks.iter().zip(&results) {
            record_sink_write(sink.name(), result.as_ref().err());
        }
        self.outcomes
            .send_if_modified(|outcomes| outcomes.record(results));

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.barrier_stats.push(elapsed_ms);
        record_barrier_latency_ms(elapsed_ms);

        self.forward(chunk).await
    }

    async fn forward(&mut self, chunk: Chunk) -> Flow {
        let len = chunk.len();
        if let Some(downstream) = &self.downstream {
            if downstream.write(chunk).await.is_err() {
                return Flow::DownstreamClosed;
            }
        }

        self.chunks += 1;
        self.bytes += len as u64;
        record_chunk_forwarded(len);

        if self.chunks % 1000 == 0 {
            debug!(chunks = self.chunks, "Fork progress");
        }
        Flow::Continue
    }

    fn relay(&self, err: StreamError) {
        debug!(error = %err, "Relaying upstream error");
        // the mirror subscription keeps at least one listener alive
        if let Err(e) = self.errors.emit(err) {
            warn!(error = %e, "Upstream error dropped");
        }
    }

    async fn dispatch(&mut self, event: LifecycleEvent) {
        let name = event.name();
        match self.lifecycle.route(event, &self.options) {
            Action::Mirror(signal) => {
                debug!(event = name, sinks = self.sinks.len(), "Mirroring signal");
                for sink in &self.sinks {
                    sink.signal(signal.clone()).await;
                }
                record_signal_mirrored(signal.name(), self.sinks.len());
            }
            Action::EndSinks => {
                debug!(sinks = self.sinks.len(), "Ending sinks");
                for sink in &self.sinks {
                    sink.end().await;
                }
            }
            Action::Relay(rx) => self.upstream_errors = Some(rx),
            Action::Ignore => debug!(event = name, "Lifecycle event ignored"),
        }
    }

    /// Mirror errors still queued when the input loop stopped
    async fn drain_errors(&mut self) {
        for err in drain(&mut self.upstream_errors) {
            self.relay(err);
        }
        for err in drain(&mut self.mirror_rx) {
            self.dispatch(LifecycleEvent::Error(err)).await;
        }
    }

    async fn terminate(&mut self) {
        self.dispatch(LifecycleEvent::Finish).await;
        // downstream sees end-of-stream once its writer is gone
        self.downstream = None;
        self.dispatch(LifecycleEvent::End).await;
        self.dispatch(LifecycleEvent::Close).await;
    }

    fn report(&self, termination: Termination) -> ForkReport {
        ForkReport {
            chunks: self.chunks,
            bytes: self.bytes,
            outcomes: self.outcomes.borrow().clone(),
            sinks: self
                .sinks
                .iter()
                .map(|h| (h.name().to_string(), h.metrics().snapshot()))
                .collect(),
            barrier_latency_ms: self.barrier_stats.summary(),
            termination,
        }
    }
}

/// Wait for the next error on an optional subscription
///
/// Pending forever when there is no subscription, so a `select!` branch
/// built on it simply never fires.
async fn next_error(rx: &mut Option<ErrorListener>) -> StreamError {
    if let Some(inner) = rx.as_mut() {
        match inner.recv().await {
            Some(err) => return err,
            None => *rx = None,
        }
    }
    std::future::pending().await
}

fn drain(rx: &mut Option<ErrorListener>) -> Vec<StreamError> {
    let mut pending = Vec::new();
    if let Some(inner) = rx.as_mut() {
        while let Ok(err) = inner.try_recv() {
            pending.push(err);
        }
    }
    pending
}

/// Same as [`Fork::new`]
pub fn fork(sinks: Vec<SinkHandle>, options: ForkOptions) -> Fork {
    Fork::new(sinks, options)
}

enum PendingSink {
    Handle(SinkHandle),
    Config(SinkConfig),
}

/// Builder for creating a Fork from a mix of ready handles, sink values
/// and sink configurations
///
/// Sinks keep the order in which they were added.
pub struct ForkBuilder {
    options: ForkOptions,
    pending: Vec<PendingSink>,
}

impl ForkBuilder {
    /// Create a new ForkBuilder
    pub fn new(options: ForkOptions) -> Self {
        Self {
            options,
            pending: Vec::new(),
        }
    }

    /// Add a running sink handle
    pub fn handle(mut self, handle: SinkHandle) -> Self {
        self.pending.push(PendingSink::Handle(handle));
        self
    }

    /// Spawn a worker for `sink` using the default queue capacity
    pub fn sink<S: ChunkSink + Send + 'static>(self, sink: S) -> Self {
        let capacity = self.options.sink_queue_capacity;
        self.handle(SinkHandle::spawn(sink, capacity))
    }

    /// Add a sink to be created from configuration at build time
    pub fn config(mut self, config: SinkConfig) -> Self {
        self.pending.push(PendingSink::Config(config));
        self
    }

    /// Build the fork, creating configured sinks in order
    #[instrument(
        name = "fork_builder_build",
        skip(self),
        fields(sink_count = self.pending.len())
    )]
    pub async fn build(self) -> Result<Fork, ForkError> {
        let mut handles = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let handle = match pending {
                PendingSink::Handle(handle) => handle,
                PendingSink::Config(config) => create_sink_handle(&config).await?,
            };
            handles.push(handle);
        }
        Ok(Fork::new(handles, self.options))
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "fork_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, ForkError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| ForkError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| ForkError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Convenience function to create a fork from sink configs
#[instrument(name = "fork_create", skip(sink_configs, options))]
pub async fn create_fork(
    sink_configs: Vec<SinkConfig>,
    options: ForkOptions,
) -> Result<Fork, ForkError> {
    sink_configs
        .into_iter()
        .fold(ForkBuilder::new(options), ForkBuilder::config)
        .build()
        .await
}
