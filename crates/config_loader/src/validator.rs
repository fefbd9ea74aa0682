//! 配置校验模块
//!
//! 校验规则：
//! - fork 选项取值范围 (容量 >= 1)
//! - sink 名称非空且唯一
//! - file sink 必须给出 path
//! - network sink 必须给出 addr
//! - queue_capacity >= 1

use std::collections::HashSet;

use contracts::{ContractError, SinkConfig, SinkType, TeeConfig};
use validator::Validate;

/// 校验 TeeConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &TeeConfig) -> Result<(), ContractError> {
    validate_fork_options(config)?;
    validate_sink_names(config)?;
    for (idx, sink) in config.sinks.iter().enumerate() {
        validate_sink(idx, sink)?;
    }
    Ok(())
}

/// 校验 fork 选项范围
fn validate_fork_options(config: &TeeConfig) -> Result<(), ContractError> {
    config
        .fork
        .validate()
        .map_err(|e| ContractError::config_validation("fork", e.to_string()))
}

/// 校验 sink 名称唯一性
fn validate_sink_names(config: &TeeConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

/// 校验单个 sink 的必填参数
fn validate_sink(idx: usize, sink: &SinkConfig) -> Result<(), ContractError> {
    sink.validate()
        .map_err(|e| ContractError::config_validation(format!("sinks[{idx}]"), e.to_string()))?;

    let required = match sink.sink_type {
        SinkType::Log => None,
        SinkType::File => Some("path"),
        SinkType::Network => Some("addr"),
    };
    if let Some(key) = required {
        let present = sink.params.get(key).is_some_and(|v| !v.trim().is_empty());
        if !present {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.{key}", sink.name),
                format!("{:?} sink requires '{key}'", sink.sink_type),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ForkOptions;

    fn minimal_config() -> TeeConfig {
        TeeConfig {
            fork: ForkOptions::default(),
            sinks: vec![
                SinkConfig::file("copy", "/tmp/copy.txt"),
                SinkConfig::log("log"),
            ],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_no_sinks_is_valid() {
        assert!(validate(&TeeConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut config = minimal_config();
        config.sinks.push(SinkConfig::log("copy"));
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut config = minimal_config();
        config.sinks[1].name = "  ".to_string();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_file_sink_requires_path() {
        let mut config = minimal_config();
        config.sinks[0].params.clear();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("requires 'path'"), "got: {err}");
    }

    #[test]
    fn test_network_sink_requires_addr() {
        let mut config = minimal_config();
        config.sinks.push(SinkConfig {
            name: "udp".to_string(),
            sink_type: SinkType::Network,
            queue_capacity: 8,
            params: Default::default(),
        });
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("requires 'addr'"), "got: {err}");
    }

    #[test]
    fn test_zero_high_water_mark() {
        let mut config = minimal_config();
        config.fork.high_water_mark = 0;
        let err = validate(&config).unwrap_err();
        assert!(
            matches!(err, ContractError::ConfigValidation { ref field, .. } if field == "fork"),
            "got: {err}"
        );
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut config = minimal_config();
        config.sinks[1].queue_capacity = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("sinks[1]"), "got: {err}");
    }
}
