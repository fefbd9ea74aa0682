//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::TeeConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    fork: ForkInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ForkInfo {
    pass_error: bool,
    high_water_mark: usize,
    sink_queue_capacity: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn build_config_info(config: &TeeConfig) -> ConfigInfo {
    ConfigInfo {
        fork: ForkInfo {
            pass_error: config.fork.pass_error,
            high_water_mark: config.fork.high_water_mark,
            sink_queue_capacity: config.fork.sink_queue_capacity,
        },
        sinks: config
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone().into_iter().collect(),
            })
            .collect(),
    }
}

fn print_config_info(config: &TeeConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 streamfork Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let fork = &config.fork;
    println!("⚙️  Fork");
    println!("   ├─ Pass errors: {}", fork.pass_error);
    println!("   ├─ High water mark: {}", fork.high_water_mark);
    println!("   └─ Sink queue capacity: {}", fork.sink_queue_capacity);

    println!("\n📤 Sinks ({})", config.sinks.len());
    for (i, sink) in config.sinks.iter().enumerate() {
        let is_last = i == config.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({:?}, queue {})",
            prefix, sink.name, sink.sink_type, sink.queue_capacity
        );
        let params: BTreeMap<_, _> = sink.params.iter().collect();
        for (key, value) in params {
            println!("   {}  {} = {}", child_prefix, key, value);
        }
    }

    println!();
}
