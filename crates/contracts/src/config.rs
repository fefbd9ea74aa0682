//! Fork configuration contracts shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Fork operator options
///
/// Anything besides `pass_error` configures the surrounding pipe plumbing,
/// not the fan-out itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ForkOptions {
    /// Relay errors of an attached upstream producer onto the fork's own error channel
    pub pass_error: bool,

    /// Capacity of the downstream pipe created by the fork
    #[validate(range(min = 1))]
    pub high_water_mark: usize,

    /// Default command queue capacity of each sink worker
    #[validate(range(min = 1))]
    pub sink_queue_capacity: usize,
}

impl Default for ForkOptions {
    fn default() -> Self {
        Self {
            pass_error: true,
            high_water_mark: 16,
            sink_queue_capacity: 16,
        }
    }
}

impl ForkOptions {
    /// Options with upstream error relaying switched off
    pub fn without_pass_error() -> Self {
        Self {
            pass_error: false,
            ..Self::default()
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    16
}

impl SinkConfig {
    /// File sink writing to `path`
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: SinkType::File,
            queue_capacity: default_queue_capacity(),
            params: HashMap::from([("path".to_string(), path.into())]),
        }
    }

    /// Log sink
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: SinkType::Log,
            queue_capacity: default_queue_capacity(),
            params: HashMap::new(),
        }
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    Network,
}

/// Top-level tee configuration: fork options plus the sinks to fork into
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TeeConfig {
    #[serde(default)]
    #[validate(nested)]
    pub fork: ForkOptions,

    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}
