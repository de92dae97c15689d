use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` out of range: got {actual}, expected {min}..={max}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        actual: u64,
    },
    #[error("initial delay must be greater than zero")]
    ZeroInitialDelay,
    #[error("backoff factor must be a finite number >= 1, got {0}")]
    InvalidBackoffFactor(f64),
    #[error("max delay ({max_ms}ms) must not be below the initial delay ({initial_ms}ms)")]
    MaxDelayBelowInitial { initial_ms: u128, max_ms: u128 },
}

/// Terminal error carried by a failed [`crate::executor::RetryOutcome`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The last error produced by the operation, unchanged.
    #[error("{0}")]
    Operation(E),
    /// The run was cancelled from outside before it could settle.
    #[error("retry run cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled => None,
        }
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}
