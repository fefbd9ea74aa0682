//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful writes
    write_count: AtomicU64,
    /// Total writes the sink reported as failed
    failure_count: AtomicU64,
    /// Total writes refused because the sink was not writable
    not_writable_count: AtomicU64,
    /// Total lifecycle signals delivered
    signal_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total write count
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Increment write count
    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get not-writable refusal count
    pub fn not_writable_count(&self) -> u64 {
        self.not_writable_count.load(Ordering::Relaxed)
    }

    /// Increment not-writable refusal count
    pub fn inc_not_writable_count(&self) {
        self.not_writable_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get delivered signal count
    pub fn signal_count(&self) -> u64 {
        self.signal_count.load(Ordering::Relaxed)
    }

    /// Increment delivered signal count
    pub fn inc_signal_count(&self) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            not_writable_count: self.not_writable_count(),
            signal_count: self.signal_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_count: u64,
    pub failure_count: u64,
    pub not_writable_count: u64,
    pub signal_count: u64,
}

impl MetricsSnapshot {
    /// Total write attempts, successful or not
    pub fn attempts(&self) -> u64 {
        self.write_count + self.failure_count + self.not_writable_count
    }
}
