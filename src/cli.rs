use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetryOn {
    /// Retry every failure.
    All,
    /// Retry only network failures, 5xx responses and rate limiting.
    Transient,
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "retry-runner",
    version,
    about = "Run a command, retrying failures with exponential backoff"
)]
pub struct CliArgs {
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    #[arg(long, default_value_t = 1000)]
    pub initial_delay_ms: u64,

    #[arg(long, default_value_t = 2.0)]
    pub backoff_factor: f64,

    #[arg(long, default_value_t = 30000)]
    pub max_delay_ms: u64,

    #[arg(long, value_enum, default_value_t = RetryOn::Transient)]
    pub retry_on: RetryOn,

    #[arg(long, default_value_t = false)]
    pub verbose: bool,

    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub retry: RetryConfig,
    pub retry_on: RetryOn,
    pub program: String,
    pub args: Vec<String>,
    pub verbose: bool,
}

impl CliArgs {
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        validate_range("initial-delay-ms", self.initial_delay_ms, 1, u64::MAX)?;
        validate_range(
            "max-delay-ms",
            self.max_delay_ms,
            self.initial_delay_ms,
            u64::MAX,
        )?;

        let retry = RetryConfig::new(
            self.retries,
            Duration::from_millis(self.initial_delay_ms),
            self.backoff_factor,
            Duration::from_millis(self.max_delay_ms),
        )?;

        let mut command = self.command.into_iter();
        let program = command.next().unwrap_or_default();

        Ok(AppConfig {
            retry,
            retry_on: self.retry_on,
            program,
            args: command.collect(),
            verbose: self.verbose,
        })
    }
}

fn validate_range(field: &'static str, actual: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if actual < min || actual > max {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(())
}
