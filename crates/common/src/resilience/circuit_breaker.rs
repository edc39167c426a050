//! Consecutive-failure circuit breaker.
//!
//! One breaker instance guards one named channel and is shared by every
//! caller of that channel; a run of transient failures from any caller opens
//! the circuit for all of them. State is process-local only and resets to
//! `Closed` on restart.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::{ConfigError, ConfigResult, FailurePredicate};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls flow through.
    Closed,
    /// Calls fail fast without touching the network.
    Open,
    /// A single trial call is allowed to probe recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive handled failures before the circuit opens.
    pub tolerance_count: u32,
    /// How long the circuit stays open before admitting a trial call.
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { tolerance_count: 5, break_duration: Duration::from_secs(15) }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tolerance_count == 0 {
            return Err(ConfigError::Invalid {
                message: "tolerance_count must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Error returned by a breaker-protected call.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without being attempted.
    #[error("circuit breaker is open, rejecting calls")]
    Open,
    /// The underlying operation ran and failed.
    #[error("operation failed")]
    Inner(#[source] E),
}

/// Mutable breaker state; guarded by one mutex so the counter and the state
/// transition can never diverge under concurrent failing calls.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker bound to a transient-failure predicate.
///
/// Failures the predicate rejects pass through without affecting the
/// failure counter; successful calls reset it.
pub struct CircuitBreaker<E, C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    handles: FailurePredicate<E>,
    inner: Mutex<BreakerState>,
    clock: C,
}

impl<E, C: Clock> fmt::Debug for CircuitBreaker<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<E> CircuitBreaker<E, SystemClock> {
    /// Create a breaker using the system clock.
    pub fn new(config: CircuitBreakerConfig, handles: FailurePredicate<E>) -> ConfigResult<Self> {
        Self::with_clock(config, handles, SystemClock)
    }
}

impl<E, C: Clock> CircuitBreaker<E, C> {
    /// Create a breaker with a custom clock (useful for testing).
    pub fn with_clock(
        config: CircuitBreakerConfig,
        handles: FailurePredicate<E>,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handles,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            clock,
        })
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker state lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    /// Current circuit state. An elapsed break duration is only observed on
    /// the next call attempt, so this may report `Open` past the deadline.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Current run of consecutive handled failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Execute `operation` behind the breaker.
    ///
    /// While the circuit is open every call returns
    /// [`CircuitBreakerError::Open`] without running the operation. Once the
    /// break duration elapses a single trial call is admitted; its outcome
    /// closes or reopens the circuit.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                if (self.handles)(&error) {
                    self.on_handled_failure();
                } else {
                    self.on_unhandled_failure();
                }
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    /// Admit or reject a call, transitioning Open to HalfOpen when the break
    /// duration has elapsed.
    fn try_acquire(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| self.clock.now().saturating_duration_since(at))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.break_duration {
                    debug!("break duration elapsed, circuit half-open, admitting trial call");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(())
                } else {
                    debug!("circuit open, rejecting call");
                    Err(CircuitBreakerError::Open)
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    debug!("trial call already in flight, rejecting call");
                    Err(CircuitBreakerError::Open)
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                debug!("trial call succeeded, closing circuit");
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.trial_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    fn on_handled_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.tolerance_count {
                    warn!(
                        failures = inner.consecutive_failures,
                        "failure tolerance reached, opening circuit"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(self.clock.now());
                }
            }
            CircuitState::HalfOpen => {
                warn!("trial call failed, reopening circuit");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(self.clock.now());
                inner.trial_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Failures outside the predicate leave the counter alone; a half-open
    /// trial that fails this way frees the slot for another trial.
    fn on_unhandled_failure(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::resilience::MockClock;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Transient => write!(f, "transient"),
                Self::Fatal => write!(f, "fatal"),
            }
        }
    }

    impl std::error::Error for TestError {}

    fn breaker(tolerance: u32, clock: MockClock) -> CircuitBreaker<TestError, MockClock> {
        let config = CircuitBreakerConfig {
            tolerance_count: tolerance,
            break_duration: Duration::from_secs(15),
        };
        let handles: FailurePredicate<TestError> =
            Arc::new(|error| matches!(error, TestError::Transient));
        CircuitBreaker::with_clock(config, handles, clock).unwrap()
    }

    async fn fail(breaker: &CircuitBreaker<TestError, MockClock>, error: TestError) {
        let result: Result<(), _> = breaker.execute(|| async move { Err(error) }).await;
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_tolerance() {
        let config =
            CircuitBreakerConfig { tolerance_count: 0, break_duration: Duration::from_secs(15) };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn opens_after_tolerance_consecutive_failures() {
        let cb = breaker(3, MockClock::new());

        fail(&cb, TestError::Transient).await;
        fail(&cb, TestError::Transient).await;
        assert_eq!(cb.state(), CircuitState::Closed);

        fail(&cb, TestError::Transient).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_running_operation() {
        let cb = breaker(1, MockClock::new());
        fail(&cb, TestError::Transient).await;

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let result = cb
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(1)
                }
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let cb = breaker(3, MockClock::new());

        fail(&cb, TestError::Transient).await;
        fail(&cb, TestError::Transient).await;
        assert_eq!(cb.consecutive_failures(), 2);

        let result = cb.execute(|| async { Ok::<_, TestError>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.consecutive_failures(), 0);

        // A fresh run must reach the tolerance again before opening.
        fail(&cb, TestError::Transient).await;
        fail(&cb, TestError::Transient).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn unhandled_failures_do_not_trip_the_circuit() {
        let cb = breaker(2, MockClock::new());

        fail(&cb, TestError::Fatal).await;
        fail(&cb, TestError::Fatal).await;
        fail(&cb, TestError::Fatal).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn half_open_trial_success_closes_circuit() {
        let clock = MockClock::new();
        let cb = breaker(1, clock.clone());
        fail(&cb, TestError::Transient).await;
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(16));

        let result = cb.execute(|| async { Ok::<_, TestError>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_trial_failure_reopens_circuit() {
        let clock = MockClock::new();
        let cb = breaker(1, clock.clone());
        fail(&cb, TestError::Transient).await;

        clock.advance(Duration::from_secs(16));
        fail(&cb, TestError::Transient).await;
        assert_eq!(cb.state(), CircuitState::Open);

        // The break timer restarted; a call before it elapses is rejected.
        clock.advance(Duration::from_secs(10));
        let result = cb.execute(|| async { Ok::<_, TestError>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test]
    async fn break_not_elapsed_keeps_rejecting() {
        let clock = MockClock::new();
        let cb = breaker(1, clock.clone());
        fail(&cb, TestError::Transient).await;

        clock.advance(Duration::from_secs(10));
        let result = cb.execute(|| async { Ok::<_, TestError>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn concurrent_failures_are_counted_without_loss() {
        let cb = Arc::new(breaker(100, MockClock::new()));
        let mut handles = vec![];

        for _ in 0..50 {
            let cb = Arc::clone(&cb);
            handles.push(tokio::spawn(async move {
                let _: Result<(), _> =
                    cb.execute(|| async { Err(TestError::Transient) }).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cb.consecutive_failures(), 50);
    }
}
