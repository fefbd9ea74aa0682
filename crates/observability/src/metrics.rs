//! Fork 扇出指标收集模块
//!
//! 记录 chunk 转发、各 sink 写入结果、信号镜像以及扇出屏障耗时。

use contracts::SinkError;
use metrics::{counter, histogram};

/// 记录一次下游转发
pub fn record_chunk_forwarded(bytes: usize) {
    counter!("streamfork_chunks_forwarded_total").increment(1);
    counter!("streamfork_bytes_forwarded_total").increment(bytes as u64);
}

/// 记录单个 sink 的一次写入结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_sink_write;
///
/// let result = handle.write(chunk).await;
/// record_sink_write(handle.name(), result.as_ref().err());
/// ```
pub fn record_sink_write(sink_name: &str, error: Option<&SinkError>) {
    let status = match error {
        None => "success",
        Some(SinkError::NotWritable { .. }) => "not_writable",
        Some(SinkError::Write { .. }) => "failure",
        Some(SinkError::WorkerStopped { .. }) => "worker_stopped",
    };
    counter!(
        "streamfork_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录镜像到 sinks 的生命周期信号
pub fn record_signal_mirrored(signal: &'static str, sinks: usize) {
    counter!("streamfork_signals_mirrored_total", "signal" => signal).increment(sinks as u64);
}

/// 记录扇出屏障耗时 (所有 sink 写入完成)
pub fn record_barrier_latency_ms(latency_ms: f64) {
    histogram!("streamfork_barrier_latency_ms").record(latency_ms);
}

/// 统计摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
