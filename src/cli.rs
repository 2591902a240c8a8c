//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// fanin - fan-in aggregation over a rendezvous channel
///
/// Many producer threads hand contributions to one consumer through an
/// unbuffered channel. The consumer stops after exactly
/// producers x per-producer receives and prints the aggregate.
///
/// Examples:
///   fanin count
///   fanin count --producers 3 --per-producer 2 --jitter-ms 50
///   fanin --format json count --timeout 5
///   fanin block --delay-ms 500
///   fanin stream --limit 4
///   fanin init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .fanin.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Also write the run report to this file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate contributions from many producers into one consumer
    Count(CountArgs),

    /// Block on a single receive until a delayed producer sends
    Block(BlockArgs),

    /// Receive messages until the producer hangs up
    Stream(StreamArgs),

    /// Generate a default .fanin.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CountArgs {
    /// Number of producer threads
    #[arg(short, long, env = "FANIN_PRODUCERS", value_name = "NUM")]
    pub producers: Option<usize>,

    /// Contributions sent by each producer
    #[arg(short = 'n', long, env = "FANIN_PER_PRODUCER", value_name = "NUM")]
    pub per_producer: Option<u64>,

    /// Value of a single contribution
    #[arg(long, value_name = "VALUE")]
    pub contribution: Option<u64>,

    /// Give up if the consumer has not finished after this many seconds
    ///
    /// Without a timeout a producer shortfall blocks forever.
    #[arg(short, long, env = "FANIN_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Delay before each producer starts sending
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Random extra delay per producer, drawn from 0..=MS
    #[arg(long, value_name = "MS")]
    pub jitter_ms: Option<u64>,

    /// Show a progress bar while consuming
    #[arg(long)]
    pub progress: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct BlockArgs {
    /// How long the producer sleeps before sending
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Message to send
    #[arg(short, long, value_name = "TEXT")]
    pub message: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct StreamArgs {
    /// Number of messages to send before closing (random 0-9 if unset)
    #[arg(short, long, value_name = "NUM")]
    pub limit: Option<usize>,

    /// Message to send
    #[arg(short, long, value_name = "TEXT")]
    pub message: Option<String>,
}

/// Output format for results and reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Command::Count(ref count) = self.command {
            if count.producers == Some(0) {
                return Err("Producers must be at least 1".to_string());
            }

            if count.timeout == Some(0) {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            config: None,
            verbose: false,
            quiet: false,
            format: None,
            output: None,
            command,
        }
    }

    #[test]
    fn test_parse_count_flags() {
        let args = Args::try_parse_from([
            "fanin",
            "--format",
            "json",
            "count",
            "--producers",
            "3",
            "-n",
            "2",
            "--timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(args.format, Some(OutputFormat::Json));
        match args.command {
            Command::Count(count) => {
                assert_eq!(count.producers, Some(3));
                assert_eq!(count.per_producer, Some(2));
                assert_eq!(count.timeout, Some(5));
                assert!(!count.progress);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flag_after_subcommand() {
        let args = Args::try_parse_from(["fanin", "stream", "--limit", "4", "-v"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Stream(StreamArgs { limit: Some(4), .. })
        ));
    }

    #[test]
    fn test_validation_zero_producers() {
        let args = make_args(Command::Count(CountArgs {
            producers: Some(0),
            ..CountArgs::default()
        }));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let args = make_args(Command::Count(CountArgs {
            timeout: Some(0),
            ..CountArgs::default()
        }));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::InitConfig);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Block(BlockArgs::default()));
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
