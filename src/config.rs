//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fanin.toml` files.

use crate::cli::{Args, Command, OutputFormat};
use crate::models::{FanInPlan, PlanError};
use crate::producer::DelayPolicy;
use crate::runner::RunOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".fanin.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Fan-in run settings.
    #[serde(default)]
    pub fan_in: FanInConfig,

    /// Producer settings.
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Settings for the `block` and `stream` commands.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output format for results.
    #[serde(default)]
    pub format: OutputFormat,

    /// Write the run report to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Shape of the fan-in run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanInConfig {
    /// Number of producer threads.
    #[serde(default = "default_producers")]
    pub producers: usize,

    /// Contributions sent by each producer.
    #[serde(default = "default_per_producer")]
    pub per_producer: u64,

    /// Value of a single contribution.
    #[serde(default = "default_contribution")]
    pub contribution: u64,

    /// Bound on the consumer loop in seconds. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Show a progress bar while consuming.
    #[serde(default)]
    pub progress: bool,
}

impl Default for FanInConfig {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            per_producer: default_per_producer(),
            contribution: default_contribution(),
            timeout_seconds: None,
            progress: false,
        }
    }
}

fn default_producers() -> usize {
    100
}

fn default_per_producer() -> u64 {
    100
}

fn default_contribution() -> u64 {
    1
}

/// Producer start delays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Fixed delay before each producer starts sending.
    #[serde(default)]
    pub delay_ms: u64,

    /// Random extra delay drawn from `0..=jitter_ms`.
    #[serde(default)]
    pub jitter_ms: u64,
}

impl From<&ProducerConfig> for DelayPolicy {
    fn from(config: &ProducerConfig) -> Self {
        DelayPolicy::new(
            Duration::from_millis(config.delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }
}

/// Settings for the single-producer commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// How long the `block` producer sleeps before sending.
    #[serde(default = "default_block_delay_ms")]
    pub block_delay_ms: u64,

    /// Message sent by the `block` producer.
    #[serde(default = "default_block_message")]
    pub block_message: String,

    /// Message sent by the `stream` producer.
    #[serde(default = "default_stream_message")]
    pub stream_message: String,

    /// Messages sent before the stream closes. Unset picks a random count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_limit: Option<usize>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            block_delay_ms: default_block_delay_ms(),
            block_message: default_block_message(),
            stream_message: default_stream_message(),
            stream_limit: None,
        }
    }
}

fn default_block_delay_ms() -> u64 {
    1000
}

fn default_block_message() -> String {
    crate::demos::block::DEFAULT_MESSAGE.to_string()
}

fn default_stream_message() -> String {
    crate::demos::stream::DEFAULT_MESSAGE.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.fanin.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        match args.command {
            Command::Count(ref count) => {
                if let Some(producers) = count.producers {
                    self.fan_in.producers = producers;
                }
                if let Some(per_producer) = count.per_producer {
                    self.fan_in.per_producer = per_producer;
                }
                if let Some(contribution) = count.contribution {
                    self.fan_in.contribution = contribution;
                }
                if let Some(timeout) = count.timeout {
                    self.fan_in.timeout_seconds = Some(timeout);
                }
                if let Some(delay_ms) = count.delay_ms {
                    self.producer.delay_ms = delay_ms;
                }
                if let Some(jitter_ms) = count.jitter_ms {
                    self.producer.jitter_ms = jitter_ms;
                }
                if count.progress {
                    self.fan_in.progress = true;
                }
            }
            Command::Block(ref block) => {
                if let Some(delay_ms) = block.delay_ms {
                    self.demo.block_delay_ms = delay_ms;
                }
                if let Some(ref message) = block.message {
                    self.demo.block_message = message.clone();
                }
            }
            Command::Stream(ref stream) => {
                if let Some(limit) = stream.limit {
                    self.demo.stream_limit = Some(limit);
                }
                if let Some(ref message) = stream.message {
                    self.demo.stream_message = message.clone();
                }
            }
            Command::InitConfig => {}
        }
    }

    /// The fan-in plan described by this configuration.
    pub fn plan(&self) -> Result<FanInPlan, PlanError> {
        FanInPlan::new(
            self.fan_in.producers,
            self.fan_in.per_producer,
            self.fan_in.contribution,
        )
    }

    /// Run options for the fan-in. The progress bar is only shown for
    /// text output.
    pub fn run_options(&self, quiet: bool) -> RunOptions {
        RunOptions {
            timeout: self.fan_in.timeout_seconds.map(Duration::from_secs),
            delay: DelayPolicy::from(&self.producer),
            progress: self.fan_in.progress && !quiet && self.general.format == OutputFormat::Text,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
