//! Tee orchestrator - wires input, fork, sinks and stdout together.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::BytesMut;
use contracts::{Chunk, ForkOptions, SinkConfig, StreamError};
use fork::{StreamReader, StreamWriter, Termination};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::TeeStats;
use crate::error::{CliError, Result};

/// Tee pipeline configuration
#[derive(Debug, Clone)]
pub struct TeePipelineConfig {
    /// Input file, `-` for stdin
    pub input: PathBuf,

    /// Sinks to fork into, in order
    pub sinks: Vec<SinkConfig>,

    pub options: ForkOptions,

    /// Forward the stream to stdout
    pub forward_to_stdout: bool,

    /// Read buffer size
    pub chunk_size: usize,
}

/// Input -> Fork -> stdout, with every chunk teed into the sinks
pub struct TeePipeline {
    config: TeePipelineConfig,
}

impl TeePipeline {
    pub fn new(config: TeePipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the input is exhausted, stdout goes away or `shutdown` fires
    ///
    /// On shutdown the input is cut off and the fork finishes normally, so
    /// every sink is still flushed and closed.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<TeeStats> {
        let start_time = Instant::now();
        let config = self.config;

        info!(sinks = config.sinks.len(), "Creating fork...");
        let mut tee = fork::create_fork(config.sinks, config.options.clone()).await?;

        // Without a listener here, errors emitted on the fork would go unhandled
        let mut errors = tee.errors().subscribe();
        let error_task = tokio::spawn(async move {
            let mut observed = 0u64;
            while let Some(err) = errors.recv().await {
                observed += 1;
                warn!(error = %err, "Stream error");
            }
            observed
        });

        let (writer, upstream) = fork::channel(config.options.high_water_mark);
        tee.pipe_from(upstream)?;

        let output_task = config
            .forward_to_stdout
            .then(|| tokio::spawn(pump_output(tee.pipe_to())));

        let fork_task = tee.spawn();
        let mut input_task = tokio::spawn(pump_input(config.input, writer, config.chunk_size));

        tokio::pin!(shutdown);
        let input = tokio::select! {
            result = &mut input_task => result,
            _ = &mut shutdown => {
                warn!("Received shutdown signal, closing input...");
                input_task.abort();
                input_task.await
            }
        };
        let input_bytes = match input {
            Ok(result) => result?,
            Err(e) if e.is_cancelled() => 0,
            Err(e) => return Err(CliError::task(e.to_string())),
        };

        let report = fork_task
            .await
            .map_err(|e| CliError::task(e.to_string()))?;
        if report.termination == Termination::DownstreamClosed {
            info!("Output closed before input was exhausted");
        }

        if let Some(task) = output_task {
            match task.await {
                Ok(Ok(bytes)) => debug!(bytes, "Output drained"),
                Ok(Err(e)) => warn!(error = %e, "Writing to stdout failed"),
                Err(e) => return Err(CliError::task(e.to_string())),
            }
        }

        let errors_observed = error_task.await.unwrap_or_default();

        Ok(TeeStats::new(
            report,
            input_bytes,
            errors_observed,
            start_time.elapsed(),
        ))
    }
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CliError::input_open(path, e))?;
    Ok(Box::new(file))
}

/// Read the input into the fork, chunk by chunk
///
/// A read failure is emitted as a stream error; with error relaying off
/// nobody hears it and the run fails.
async fn pump_input(input: PathBuf, writer: StreamWriter, chunk_size: usize) -> Result<u64> {
    let mut reader = open_input(&input).await?;
    let mut buf = BytesMut::with_capacity(chunk_size);
    let mut total = 0u64;

    loop {
        buf.reserve(chunk_size);
        match reader.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                total += n as u64;
                if writer.write(Chunk::new(buf.split().freeze())).await.is_err() {
                    debug!("Fork stopped reading input");
                    break;
                }
            }
            Err(e) => {
                warn!(input = %input.display(), error = %e, "Input read failed");
                writer.emit_error(StreamError::new(format!("input read failed: {e}")))?;
                break;
            }
        }
    }

    debug!(bytes = total, "Input exhausted");
    Ok(total)
}

/// Copy forwarded chunks to stdout
///
/// Returning drops the reader, which stops the fork.
async fn pump_output(mut downstream: StreamReader) -> std::io::Result<u64> {
    let mut stdout = tokio::io::stdout();
    let mut total = 0u64;

    while let Some(chunk) = downstream.recv().await {
        stdout.write_all(chunk.data()).await?;
        total += chunk.len() as u64;
    }
    stdout.flush().await?;
    Ok(total)
}
