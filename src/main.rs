//! fanin - fan-in aggregation over a rendezvous channel
//!
//! Producers hand contributions to a single consumer through an
//! unbuffered channel; the consumer stops after exactly the expected
//! number of receives and prints the aggregate.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid plan, timeout, config failure, etc.)
//!   130 - Interrupted with Ctrl-C before the run finished

mod aggregation;
mod channel;
mod cli;
mod config;
mod demos;
mod models;
mod producer;
mod report;
mod runner;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command};
use config::{Config, CONFIG_FILE};
use models::{RunKind, RunMetadata, RunReport};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    let Some(kind) = run_kind(&args.command) else {
        return handle_init_config();
    };

    // Initialize logging
    init_logging(&args);

    info!("fanin v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, kind).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// The run a command performs. `None` for `init-config`, which runs
/// nothing.
fn run_kind(command: &Command) -> Option<RunKind> {
    match command {
        Command::Count(_) => Some(RunKind::Count),
        Command::Block(_) => Some(RunKind::Block),
        Command::Stream(_) => Some(RunKind::Stream),
        Command::InitConfig => None,
    }
}

/// Handle init-config: generate a default .fanin.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings. Logs go to stderr so
/// stdout only carries results. `RUST_LOG` overrides the level.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(args.verbose)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the selected command. Returns the exit code (0 or 130).
async fn run(args: Args, kind: RunKind) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let format = config.general.format;
    let quiet = args.quiet;
    let job_config = config.clone();

    // Producers and the consumer block, so keep them off the async workers.
    let job = tokio::task::spawn_blocking(move || match kind {
        RunKind::Count => run_count(&job_config, quiet),
        RunKind::Block => run_block(&job_config),
        RunKind::Stream => run_stream(&job_config),
    });

    let report = tokio::select! {
        joined = job => joined.context("Run task failed")??,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted before the {} run finished", kind);
            eprintln!("\n⛔ Interrupted before the run finished.");
            return Ok(130);
        }
    };

    let line = report::result_line(&report, format)?;
    if !line.is_empty() {
        println!("{}", line);
    }

    if let Some(ref output) = config.general.output {
        let path = Path::new(output);
        report::write_report(&report, format, path)?;
        info!("Report saved to: {}", path.display());
    }

    Ok(0)
}

/// Run the fan-in aggregator.
fn run_count(config: &Config, quiet: bool) -> Result<RunReport> {
    let plan = config.plan().context("Invalid fan-in plan")?;
    let expected_receives = plan.expected_receives()?;
    let options = config.run_options(quiet);

    if options.timeout.is_none() {
        debug!("No timeout set; a producer shortfall blocks forever");
    }

    let run_date = Utc::now();
    let outcome = runner::run_fan_in(plan, &options)?;

    for producer in outcome.producers.iter().filter(|p| p.interrupted) {
        warn!("Producer {} stopped early after {} sends", producer.id, producer.sent);
    }

    Ok(RunReport {
        metadata: RunMetadata {
            kind: RunKind::Count,
            run_date,
            producers: plan.producers,
            per_producer: Some(plan.per_producer),
            contribution: Some(plan.contribution),
            expected_receives: Some(expected_receives),
            duration_seconds: outcome.elapsed.as_secs_f64(),
        },
        received: outcome.received,
        aggregate: Some(outcome.aggregate),
        messages: Vec::new(),
    })
}

/// Run the single blocking receive.
fn run_block(config: &Config) -> Result<RunReport> {
    let run_date = Utc::now();
    let start_time = Instant::now();
    let delay = Duration::from_millis(config.demo.block_delay_ms);

    info!("Waiting for a message sent after {:?}", delay);
    let message = demos::run_block(delay, config.demo.block_message.clone())?;

    Ok(demo_report(RunKind::Block, run_date, start_time, vec![message]))
}

/// Receive a stream until the producer closes the channel.
fn run_stream(config: &Config) -> Result<RunReport> {
    let run_date = Utc::now();
    let start_time = Instant::now();
    let limit = config
        .demo
        .stream_limit
        .unwrap_or_else(|| demos::stream::random_limit(&mut rand::thread_rng()));

    info!("Streaming {} messages", limit);
    let mut messages = Vec::with_capacity(limit);
    demos::run_stream(limit, config.demo.stream_message.clone(), |message| {
        debug!("Received: {}", message);
        messages.push(message.to_string());
    });

    Ok(demo_report(RunKind::Stream, run_date, start_time, messages))
}

fn demo_report(
    kind: RunKind,
    run_date: chrono::DateTime<Utc>,
    start_time: Instant,
    messages: Vec<String>,
) -> RunReport {
    RunReport {
        metadata: RunMetadata {
            kind,
            run_date,
            producers: 1,
            per_producer: None,
            contribution: None,
            expected_receives: None,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        received: messages.len() as u64,
        aggregate: None,
        messages,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{BlockArgs, CountArgs, StreamArgs};

    fn make_args(command: Command) -> Args {
        Args {
            config: None,
            verbose: false,
            quiet: true,
            format: None,
            output: None,
            command,
        }
    }

    #[test]
    fn test_run_kind_per_command() {
        assert_eq!(
            run_kind(&Command::Count(CountArgs::default())),
            Some(RunKind::Count)
        );
        assert_eq!(
            run_kind(&Command::Block(BlockArgs {
                delay_ms: None,
                message: None,
            })),
            Some(RunKind::Block)
        );
        assert_eq!(
            run_kind(&Command::Stream(StreamArgs {
                limit: None,
                message: None,
            })),
            Some(RunKind::Stream)
        );
        assert_eq!(run_kind(&Command::InitConfig), None);
    }

    #[test]
    fn test_run_count_scenario() {
        let mut config = Config::default();
        config.merge_with_args(&make_args(Command::Count(CountArgs {
            producers: Some(3),
            per_producer: Some(2),
            jitter_ms: Some(10),
            ..CountArgs::default()
        })));

        let report = run_count(&config, true).unwrap();
        assert_eq!(report.aggregate, Some(6));
        assert_eq!(report.received, 6);
        assert_eq!(report.metadata.expected_receives, Some(6));
    }

    #[test]
    fn test_run_block_reports_message() {
        let mut config = Config::default();
        config.merge_with_args(&make_args(Command::Block(BlockArgs {
            delay_ms: Some(10),
            message: None,
        })));

        let report = run_block(&config).unwrap();
        assert_eq!(report.messages, vec![demos::block::DEFAULT_MESSAGE]);
        assert_eq!(report.received, 1);
    }

    #[test]
    fn test_run_stream_with_fixed_limit() {
        let mut config = Config::default();
        config.merge_with_args(&make_args(Command::Stream(StreamArgs {
            limit: Some(3),
            message: None,
        })));

        let report = run_stream(&config).unwrap();
        assert_eq!(report.received, 3);
        assert!(report.messages.iter().all(|m| m == "Hello!"));
    }

    #[tokio::test]
    async fn test_run_writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.json");

        let mut args = make_args(Command::Count(CountArgs {
            producers: Some(2),
            per_producer: Some(5),
            ..CountArgs::default()
        }));
        args.config = Some(dir.path().join("missing.toml"));
        args.output = Some(output.clone());
        args.format = Some(cli::OutputFormat::Json);

        // An explicit config path that does not exist is an error.
        assert!(run(args.clone(), RunKind::Count).await.is_err());

        std::fs::write(dir.path().join("missing.toml"), "").unwrap();
        assert_eq!(run(args, RunKind::Count).await.unwrap(), 0);

        let written: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.aggregate, Some(10));
    }

    #[test]
    fn test_invalid_plan_fails_count() {
        let mut config = Config::default();
        config.fan_in.per_producer = u64::MAX;
        config.fan_in.producers = 2;

        assert!(run_count(&config, true).is_err());
    }
}
