pub mod classify;
pub mod cli;
pub mod error;
pub mod executor;
pub mod retry;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryOutcome, Retryable};
pub use retry::{RetryConfig, RetryPolicy};
