use std::fmt::{self, Display};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RetryError;
use crate::retry::RetryPolicy;

/// Terminal result of a retry run.
///
/// `attempts` is the number of times the operation was actually invoked. It is
/// only zero for a run whose token was cancelled before the first attempt.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    Failure { error: RetryError<E>, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Failure { error, .. } if error.is_cancelled())
    }

    pub fn into_result(self) -> Result<T, RetryError<E>> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

/// Drives an operation through attempts and backoff waits under a shared policy.
pub struct RetryExecutor<E> {
    policy: Arc<RetryPolicy<E>>,
}

impl<E> RetryExecutor<E> {
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// Binds this executor's policy to an operation-producing function.
    pub fn wrap<F>(&self, make: F) -> Retryable<F, E> {
        Retryable {
            executor: self.clone(),
            make,
        }
    }
}

impl<E: Display> RetryExecutor<E> {
    /// Runs `operation` until it succeeds, the policy gives up, or `cancel` fires.
    ///
    /// Attempts are strictly sequential. Cancellation abandons the in-flight
    /// attempt or the pending wait, whichever is current; no further attempt
    /// is started afterwards.
    pub async fn run<F, Fut, T>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts_so_far = 0_u32;
        let mut current_delay = self.policy.config().initial_delay;

        loop {
            if cancel.is_cancelled() {
                debug!(attempts = attempts_so_far, "cancelled before next attempt");
                return RetryOutcome::Failure {
                    error: RetryError::Cancelled,
                    attempts: attempts_so_far,
                };
            }

            let attempt = attempts_so_far.saturating_add(1);
            debug!(attempt, "starting attempt");

            let settled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = operation() => Some(result),
            };

            let err = match settled {
                Some(Ok(value)) => {
                    debug!(attempt, "attempt succeeded");
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Some(Err(err)) => err,
                None => {
                    debug!(attempt, "cancelled while attempt was in flight");
                    return RetryOutcome::Failure {
                        error: RetryError::Cancelled,
                        attempts: attempt,
                    };
                }
            };

            attempts_so_far = attempt;
            if !self.policy.should_retry(attempts_so_far, &err) {
                debug!(attempts = attempts_so_far, error = %err, "giving up");
                return RetryOutcome::Failure {
                    error: RetryError::Operation(err),
                    attempts: attempts_so_far,
                };
            }

            let (delay, updated_delay) = self.policy.next_delay(current_delay);
            warn!(
                attempt = attempts_so_far,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "attempt failed; retrying"
            );
            self.notify(attempts_so_far, &err, delay);
            current_delay = updated_delay;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempts = attempts_so_far, "cancelled during retry backoff");
                    return RetryOutcome::Failure {
                        error: RetryError::Cancelled,
                        attempts: attempts_so_far,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    pub async fn run_uncancellable<F, Fut, T>(&self, operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation, &CancellationToken::new()).await
    }

    fn notify(&self, attempt: u32, err: &E, delay: Duration) {
        let Some(hook) = self.policy.on_retry() else {
            return;
        };

        // A panicking hook must not take the run down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| hook(attempt, err, delay))).is_err() {
            warn!(attempt, "on_retry hook panicked; continuing");
        }
    }
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<E> From<RetryPolicy<E>> for RetryExecutor<E> {
    fn from(policy: RetryPolicy<E>) -> Self {
        Self::new(policy)
    }
}

/// A function bound to a fixed retry policy, callable any number of times.
pub struct Retryable<F, E> {
    executor: RetryExecutor<E>,
    make: F,
}

impl<F, E: Display> Retryable<F, E> {
    pub async fn call<A, Fut, T>(
        &self,
        args: A,
        cancel: &CancellationToken,
    ) -> RetryOutcome<T, E>
    where
        A: Clone,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.executor.run(|| (self.make)(args.clone()), cancel).await
    }

    pub fn executor(&self) -> &RetryExecutor<E> {
        &self.executor
    }
}
