//! Resilience patterns for outbound HTTP calls
//!
//! This module provides the transient-fault-handling policies used by the
//! contracts API clients:
//! - **Retry**: re-issues an operation on transient failures with pure
//!   exponential backoff (no jitter).
//! - **Circuit Breaker**: sheds load from a failing dependency after a run of
//!   consecutive transient failures.
//! - **Policy Registry**: a keyed store that holds one retry policy and one
//!   circuit breaker per logical service, built once at startup.
//!
//! All policies are generic over the error type `E` and classify failures
//! through a shared [`FailurePredicate`], so the same predicate drives both
//! the retry decision and the breaker's failure counter.

pub mod circuit_breaker;
pub mod clock;
pub mod registry;
pub mod retry;

use std::sync::Arc;

use thiserror::Error;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use registry::{PolicyKind, PolicyOptions, PolicyRegistry, RegistryError};
pub use retry::{ExponentialBackoff, RetryPolicy};

/// Shared predicate deciding whether a failure should be handled by the
/// resilience policies (retried, counted against the circuit breaker).
pub type FailurePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Invalid policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is out of range or otherwise unusable.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Explanation of the rejected value.
        message: String,
    },
}

/// Result type for policy construction.
pub type ConfigResult<T> = Result<T, ConfigError>;
