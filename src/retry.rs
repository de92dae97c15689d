use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Upper bound of the random jitter, as a fraction of the current delay.
pub const MAX_JITTER_RATIO: f64 = 0.3;

pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub type RetryHook<E> = Arc<dyn Fn(u32, &E, Duration) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryConfig {
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        backoff_factor: f64,
        max_delay: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            max_retries,
            initial_delay,
            backoff_factor,
            max_delay,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::ZeroInitialDelay);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::MaxDelayBelowInitial {
                initial_ms: self.initial_delay.as_millis(),
                max_ms: self.max_delay.as_millis(),
            });
        }
        Ok(())
    }
}

/// Retry decisions for one kind of operation error.
///
/// A policy is immutable once built and can be shared by any number of
/// concurrent runs. The default predicate treats every error as retryable.
/// `new` rejects any config that fails [`RetryConfig::validate`].
pub struct RetryPolicy<E> {
    config: RetryConfig,
    predicate: RetryPredicate<E>,
    on_retry: Option<RetryHook<E>>,
}

impl<E> RetryPolicy<E> {
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError>
    where
        E: 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            predicate: Arc::new(|_: &E| true),
            on_retry: None,
        })
    }

    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Registers a hook called with `(attempts_so_far, error, delay)` before each wait.
    pub fn with_on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(u32, &E, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub(crate) fn on_retry(&self) -> Option<&RetryHook<E>> {
        self.on_retry.as_ref()
    }

    pub fn should_retry(&self, attempts_so_far: u32, error: &E) -> bool {
        if attempts_so_far > self.config.max_retries {
            return false;
        }
        (self.predicate)(error)
    }

    /// Returns `(delay_to_use, updated_delay)`.
    ///
    /// Only `delay_to_use` carries jitter; `updated_delay` is the plain
    /// exponential step, so jitter never compounds across retries.
    pub fn next_delay(&self, current_delay: Duration) -> (Duration, Duration) {
        let fraction = rand::thread_rng().gen_range(0.0..=MAX_JITTER_RATIO);
        self.next_delay_with_jitter(current_delay, fraction)
    }

    pub(crate) fn next_delay_with_jitter(
        &self,
        current_delay: Duration,
        fraction: f64,
    ) -> (Duration, Duration) {
        let max_delay = self.config.max_delay;
        let jitter = current_delay.mul_f64(fraction.clamp(0.0, MAX_JITTER_RATIO));
        let delay_to_use = current_delay.saturating_add(jitter).min(max_delay);
        let updated =
            Duration::try_from_secs_f64(current_delay.as_secs_f64() * self.config.backoff_factor)
                .unwrap_or(max_delay)
                .min(max_delay);
        (delay_to_use, updated)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            predicate: Arc::clone(&self.predicate),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}
