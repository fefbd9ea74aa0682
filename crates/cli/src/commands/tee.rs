//! `tee` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{SinkConfig, TeeConfig};
use tracing::{info, warn};

use crate::cli::TeeArgs;
use crate::error::CliError;
use crate::pipeline::{TeePipeline, TeePipelineConfig};

/// Execute the `tee` command
pub async fn run_tee(args: &TeeArgs) -> Result<()> {
    let config = build_config(args)?;

    info!(
        input = %args.input.display(),
        sinks = config.sinks.len(),
        pass_error = config.fork.pass_error,
        high_water_mark = config.fork.high_water_mark,
        "Configuration loaded"
    );

    if config.sinks.is_empty() {
        warn!("No sinks configured - input is only passed through");
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let pipeline = TeePipeline::new(TeePipelineConfig {
        input: args.input.clone(),
        sinks: config.sinks,
        options: config.fork,
        forward_to_stdout: !args.quiet_output,
        chunk_size: args.chunk_size.max(1),
    });

    let stats = pipeline
        .run(setup_shutdown_signal())
        .await
        .context("Tee execution failed")?;

    info!(
        chunks = stats.chunks,
        bytes = stats.bytes,
        duration_secs = stats.duration.as_secs_f64(),
        failed_sinks = stats.failed_sinks(),
        "Tee completed"
    );
    stats.print_summary();

    Ok(())
}

/// Merge the config file with command-line sinks and overrides
fn build_config(args: &TeeArgs) -> Result<TeeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => TeeConfig::default(),
    };

    for path in &args.to {
        let mut sink = SinkConfig::file(path.display().to_string(), path.display().to_string());
        sink.queue_capacity = config.fork.sink_queue_capacity;
        if args.append {
            sink.params.insert("append".to_string(), "true".to_string());
        }
        config.sinks.push(sink);
    }

    if args.no_pass_error {
        config.fork.pass_error = false;
    }
    if let Some(high_water_mark) = args.high_water_mark {
        config.fork.high_water_mark = high_water_mark;
    }

    ConfigLoader::validate(&config).context("Invalid tee configuration")?;
    Ok(config)
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
