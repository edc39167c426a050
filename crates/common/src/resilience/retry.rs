//! Retry policy with pure exponential backoff.
//!
//! Failures classified as transient by the policy's predicate are retried up
//! to a fixed number of times; before retry *n* (1-indexed) the caller is
//! suspended for `power^n` seconds. No jitter is applied. Failures the
//! predicate rejects, and the last failure once retries are exhausted,
//! propagate to the caller unchanged.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::{ConfigError, ConfigResult, FailurePredicate};

/// Exponential backoff schedule: `power^n` seconds before retry `n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    power: f64,
}

impl ExponentialBackoff {
    /// Create a backoff schedule with the given base.
    pub fn new(power: f64) -> ConfigResult<Self> {
        if !power.is_finite() || power < 0.0 {
            return Err(ConfigError::Invalid {
                message: format!("backoff power must be a non-negative number, got {power}"),
            });
        }
        Ok(Self { power })
    }

    /// Delay before retry attempt `attempt` (1-indexed).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let secs = self.power.powi(attempt as i32);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Retry policy bound to a transient-failure predicate.
///
/// `retry_count` is the number of retries, so an operation is attempted at
/// most `retry_count + 1` times.
pub struct RetryPolicy<E> {
    retry_count: u32,
    backoff: ExponentialBackoff,
    handles: FailurePredicate<E>,
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retry_count", &self.retry_count)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E>
where
    E: fmt::Display,
{
    /// Create a retry policy.
    pub fn new(
        retry_count: u32,
        backoff_power: f64,
        handles: FailurePredicate<E>,
    ) -> ConfigResult<Self> {
        Ok(Self { retry_count, backoff: ExponentialBackoff::new(backoff_power)?, handles })
    }

    /// Number of retries after the initial attempt.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Execute `operation`, retrying transient failures with backoff.
    ///
    /// The delay suspends only the calling task. The final error, whether
    /// non-transient or the last of an exhausted sequence, is returned as-is.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.retry_count {
                        warn!(attempts = attempt + 1, error = %error, "retries exhausted");
                        return Err(error);
                    }
                    if !(self.handles)(&error) {
                        debug!(error = %error, "failure is not transient, not retrying");
                        return Err(error);
                    }

                    attempt += 1;
                    let delay = self.backoff.delay_before(attempt);
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %error,
                        "transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
