//! Tee run statistics.

use std::time::Duration;

use fork::{ForkReport, Termination};
use observability::StatsSummary;
use serde::Serialize;

/// Per-sink result of a run
#[derive(Debug, Clone, Serialize)]
pub struct SinkSummary {
    pub name: String,
    pub writes: u64,
    pub failures: u64,
    pub not_writable: u64,
    /// Last recorded write failure, if any
    pub last_error: Option<String>,
}

/// Statistics from a tee run
#[derive(Debug, Clone)]
pub struct TeeStats {
    /// Bytes read from the input
    pub input_bytes: u64,

    /// Chunks passed through the fork
    pub chunks: u64,

    /// Bytes passed through the fork
    pub bytes: u64,

    /// Errors observed on the fork's error channel
    pub errors_observed: u64,

    /// Total duration of the run
    pub duration: Duration,

    pub termination: Termination,

    pub barrier_latency_ms: StatsSummary,

    pub sinks: Vec<SinkSummary>,
}

impl TeeStats {
    /// Merge a fork report with the pipeline's own counters
    pub fn new(report: ForkReport, input_bytes: u64, errors_observed: u64, duration: Duration) -> Self {
        let sinks = report
            .sinks
            .iter()
            .enumerate()
            .map(|(idx, (name, snapshot))| SinkSummary {
                name: name.clone(),
                writes: snapshot.write_count,
                failures: snapshot.failure_count,
                not_writable: snapshot.not_writable_count,
                last_error: report.outcomes.get(idx).map(ToString::to_string),
            })
            .collect();

        Self {
            input_bytes,
            chunks: report.chunks,
            bytes: report.bytes,
            errors_observed,
            duration,
            termination: report.termination,
            barrier_latency_ms: report.barrier_latency_ms,
            sinks,
        }
    }

    /// Throughput in MiB/s
    pub fn throughput_mib(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes as f64 / (1024.0 * 1024.0) / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn failed_sinks(&self) -> usize {
        self.sinks.iter().filter(|s| s.last_error.is_some()).count()
    }

    /// Print detailed summary
    ///
    /// Goes to stderr; stdout carries the stream itself.
    pub fn print_summary(&self) {
        eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
        eprintln!("║                      Tee Statistics                          ║");
        eprintln!("╚══════════════════════════════════════════════════════════════╝\n");

        eprintln!("📊 Overview");
        eprintln!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        eprintln!("   ├─ Input bytes: {}", self.input_bytes);
        eprintln!("   ├─ Chunks forwarded: {}", self.chunks);
        eprintln!("   ├─ Bytes forwarded: {}", self.bytes);
        eprintln!("   ├─ Throughput: {:.2} MiB/s", self.throughput_mib());
        eprintln!("   ├─ Errors observed: {}", self.errors_observed);
        eprintln!("   ├─ Barrier latency (ms): {}", self.barrier_latency_ms);
        eprintln!("   └─ Termination: {:?}", self.termination);

        if !self.sinks.is_empty() {
            eprintln!("\n📤 Sinks ({})", self.sinks.len());
            for (i, sink) in self.sinks.iter().enumerate() {
                let is_last = i == self.sinks.len() - 1;
                let prefix = if is_last { "└─" } else { "├─" };
                let status = match &sink.last_error {
                    Some(err) => format!("✗ {err}"),
                    None => "✓ ok".to_string(),
                };
                eprintln!(
                    "   {} {}: {} writes, {} failed, {} refused - {}",
                    prefix, sink.name, sink.writes, sink.failures, sink.not_writable, status
                );
            }
        }

        eprintln!();
    }
}
