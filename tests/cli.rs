use std::time::Duration;

use assert_matches::assert_matches;
use clap::Parser;

use retry_runner::cli::{CliArgs, RetryOn};
use retry_runner::error::ConfigError;

#[test]
fn parses_defaults_and_command() {
    let args = CliArgs::try_parse_from(["retry-runner", "--", "curl", "-fsS", "https://example.com"])
        .expect("cli parse should succeed");

    let config = args.into_config().expect("config should validate");

    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.initial_delay, Duration::from_millis(1000));
    assert_eq!(config.retry.backoff_factor, 2.0);
    assert_eq!(config.retry.max_delay, Duration::from_millis(30_000));
    assert_eq!(config.retry_on, RetryOn::Transient);
    assert_eq!(config.program, "curl");
    assert_eq!(config.args, vec!["-fsS", "https://example.com"]);
    assert!(!config.verbose);
}

#[test]
fn parses_retry_overrides() {
    let args = CliArgs::try_parse_from([
        "retry-runner",
        "--retries",
        "0",
        "--initial-delay-ms",
        "250",
        "--backoff-factor",
        "1.5",
        "--max-delay-ms",
        "5000",
        "--retry-on",
        "all",
        "false",
    ])
    .expect("cli parse should succeed");

    let config = args.into_config().expect("config should validate");

    assert_eq!(config.retry.max_retries, 0);
    assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
    assert_eq!(config.retry.backoff_factor, 1.5);
    assert_eq!(config.retry.max_delay, Duration::from_millis(5000));
    assert_eq!(config.retry_on, RetryOn::All);
    assert_eq!(config.program, "false");
    assert!(config.args.is_empty());
}

#[test]
fn requires_a_command() {
    let err = CliArgs::try_parse_from(["retry-runner"]).expect_err("parse should fail");

    assert_eq!(
        err.kind(),
        clap::error::ErrorKind::MissingRequiredArgument
    );
}

#[test]
fn rejects_zero_initial_delay() {
    let args = CliArgs::try_parse_from(["retry-runner", "--initial-delay-ms", "0", "true"])
        .expect("cli parse should succeed");

    let err = args.into_config().expect_err("validation should fail");
    assert_matches!(
        err,
        ConfigError::OutOfRange { field, min: 1, actual: 0, .. } if field == "initial-delay-ms"
    );
}

#[test]
fn rejects_max_delay_below_initial_delay() {
    let args = CliArgs::try_parse_from([
        "retry-runner",
        "--initial-delay-ms",
        "2000",
        "--max-delay-ms",
        "1000",
        "true",
    ])
    .expect("cli parse should succeed");

    let err = args.into_config().expect_err("validation should fail");
    assert_matches!(
        err,
        ConfigError::OutOfRange {
            field,
            min: 2000,
            max,
            actual: 1000
        } if field == "max-delay-ms" && max == u64::MAX
    );
}

#[test]
fn rejects_shrinking_backoff_factor() {
    let args = CliArgs::try_parse_from(["retry-runner", "--backoff-factor", "0.5", "true"])
        .expect("cli parse should succeed");

    let err = args.into_config().expect_err("validation should fail");
    assert_matches!(err, ConfigError::InvalidBackoffFactor(f) if f == 0.5);
}
