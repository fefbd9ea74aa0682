//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// streamfork - tee a byte stream into files, logs and UDP sinks
#[derive(Parser, Debug)]
#[command(
    name = "streamfork",
    author,
    version,
    about = "Tee a stream into several sinks while passing it through",
    long_about = "Reads a byte stream, writes every chunk into all configured sinks \n\
                  concurrently and forwards it to stdout once every sink has \n\
                  acknowledged it."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAMFORK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "STREAMFORK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy input to stdout and into every sink
    Tee(TeeArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `tee` command
#[derive(Parser, Debug, Clone)]
pub struct TeeArgs {
    /// Input file, `-` for stdin
    #[arg(short, long, default_value = "-", env = "STREAMFORK_INPUT")]
    pub input: PathBuf,

    /// Also write the stream to this file (repeatable)
    #[arg(long = "to", value_name = "FILE")]
    pub to: Vec<PathBuf>,

    /// Append to `--to` files instead of truncating them
    #[arg(long)]
    pub append: bool,

    /// Sink configuration file (TOML or JSON)
    #[arg(short, long, env = "STREAMFORK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not relay input errors onto the sinks
    #[arg(long)]
    pub no_pass_error: bool,

    /// Do not forward the stream to stdout
    #[arg(long)]
    pub quiet_output: bool,

    /// Read buffer size in bytes
    #[arg(long, default_value = "65536", env = "STREAMFORK_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Override the pipe capacity from configuration
    #[arg(long, env = "STREAMFORK_HIGH_WATER_MARK")]
    pub high_water_mark: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "STREAMFORK_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "streamfork.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "streamfork.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tee_args() {
        let cli = Cli::try_parse_from([
            "streamfork",
            "tee",
            "--to",
            "a.txt",
            "--to",
            "b.txt",
            "--no-pass-error",
        ])
        .unwrap();

        let Commands::Tee(args) = cli.command else {
            panic!("expected tee command");
        };
        assert_eq!(args.input, PathBuf::from("-"));
        assert_eq!(args.to, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert!(args.no_pass_error);
        assert!(!args.quiet_output);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["streamfork", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
