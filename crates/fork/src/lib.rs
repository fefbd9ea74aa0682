//! # Fork
//!
//! 流分叉模块。
//!
//! 负责：
//! - 把每个 chunk 并发写入所有 sinks，全部完成后才转发下游
//! - 记录每个 sink 最近一次的写入失败
//! - 把 error / end / close 信号镜像到 sinks，上游结束时统一收尾

pub mod error;
pub mod fork;
pub mod handle;
pub mod lifecycle;
pub mod metrics;
pub mod outcomes;
pub mod sinks;
pub mod stream;

pub use contracts::{
    Chunk, ChunkSink, Encoding, ForkOptions, SinkConfig, SinkError, SinkSignal, SinkType,
    StreamError, UnhandledError,
};
pub use error::ForkError;
pub use fork::{
    create_fork, create_sink_handle, fork, Fork, ForkBuilder, ForkReport, Termination,
};
pub use handle::{SinkHandle, SinkState};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use outcomes::WriteOutcomes;
pub use sinks::{FileSink, LogSink, MemorySink, MemorySinkProbe, NetworkSink};
pub use stream::{
    channel, channel_with_errors, ErrorEmitter, ErrorListener, StreamReader, StreamWriter,
};
