use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use retry_runner::classify;
use retry_runner::cli::{AppConfig, CliArgs, RetryOn};
use retry_runner::error::{CommandError, ConfigError, RetryError};
use retry_runner::executor::{RetryExecutor, RetryOutcome};
use retry_runner::retry::RetryPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = args.into_config()?;
    let executor = RetryExecutor::new(build_policy(&config)?);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    match executor.run(|| run_once(&config), &cancel).await {
        RetryOutcome::Success { attempts, .. } => {
            info!(attempts, "command succeeded");
            Ok(())
        }
        RetryOutcome::Failure {
            error: RetryError::Cancelled,
            attempts,
        } => {
            info!(attempts, "shutdown requested, exiting");
            Ok(())
        }
        RetryOutcome::Failure {
            error: RetryError::Operation(err),
            attempts,
        } => Err(anyhow::Error::new(err).context(format!(
            "`{}` failed after {attempts} attempt(s)",
            config.program
        ))),
    }
}

fn build_policy(config: &AppConfig) -> Result<RetryPolicy<CommandError>, ConfigError> {
    let policy = RetryPolicy::new(config.retry.clone())?;

    Ok(match config.retry_on {
        RetryOn::All => policy,
        RetryOn::Transient => policy.with_predicate(classify::is_retryable::<CommandError>),
    })
}

async fn run_once(config: &AppConfig) -> Result<(), CommandError> {
    let output = Command::new(&config.program)
        .args(&config.args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: config.program.clone(),
            source,
        })?;

    // Output is captured per attempt; pass it through once the attempt settles.
    if let Err(err) = std::io::stdout().write_all(&output.stdout) {
        debug!(error = %err, "failed to forward command stdout");
    }
    if let Err(err) = std::io::stderr().write_all(&output.stderr) {
        debug!(error = %err, "failed to forward command stderr");
    }

    if output.status.success() {
        return Ok(());
    }

    Err(CommandError::Failed {
        program: config.program.clone(),
        status: output.status,
        stderr: last_line(&output.stderr),
    })
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("info,retry_runner=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
