//! # Pipeline Configuration
//!
//! Run configuration read by every task at spawn time. Values are layered with the
//! `config` crate: built-in defaults, then an optional TOML file, then `PIPELINE_*`
//! environment variables. The binary applies command-line flags on top.

use crate::error::{PipelineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "PIPELINE";

/// Configuration file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";

/// Half-open range `[min_ms, max_ms)` of milliseconds a worker sleeps per message.
/// A range with `min_ms == max_ms` is a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Range that always yields the same delay
    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min_ms > self.max_ms {
            return Err(PipelineError::Configuration(format!(
                "{name}: min_ms ({}) must not exceed max_ms ({})",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub producer_count: usize,
    pub consumer_count: usize,
    pub messages_per_producer: usize,
    pub queue_capacity: usize,
    pub producer_delay: DelayRange,
    pub consumer_delay: DelayRange,
    pub monitor_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producer_count: 10,
            consumer_count: 5,
            messages_per_producer: 5,
            queue_capacity: 100,
            producer_delay: DelayRange::new(100, 500),
            consumer_delay: DelayRange::new(200, 600),
            monitor_interval_ms: 5000,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from defaults, an optional file and the process environment.
    ///
    /// When `path` is `None`, `pipeline.toml` in the working directory is used if present.
    /// An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_environment(path, Self::environment_source())
    }

    /// Load configuration using an explicit environment source.
    ///
    /// Useful for tests that must not touch global environment variables.
    pub fn load_with_environment(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).map_err(config_error)?;

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(environment)
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        config.validate()?;

        debug!(
            producer_count = config.producer_count,
            consumer_count = config.consumer_count,
            messages_per_producer = config.messages_per_producer,
            queue_capacity = config.queue_capacity,
            monitor_interval_ms = config.monitor_interval_ms,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// `PIPELINE_*` environment source; nested keys use a double underscore,
    /// e.g. `PIPELINE_PRODUCER_DELAY__MIN_MS`.
    pub fn environment_source() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.consumer_count == 0 {
            return Err(PipelineError::Configuration(
                "consumer_count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Configuration(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.monitor_interval_ms == 0 {
            return Err(PipelineError::Configuration(
                "monitor_interval_ms must be greater than 0".to_string(),
            ));
        }
        self.producer_delay.validate("producer_delay")?;
        self.consumer_delay.validate("consumer_delay")?;
        Ok(())
    }

    /// Number of messages a run produces when nothing is cancelled
    pub fn expected_messages(&self) -> usize {
        self.producer_count * self.messages_per_producer
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

fn config_error(err: config::ConfigError) -> PipelineError {
    PipelineError::Configuration(err.to_string())
}
