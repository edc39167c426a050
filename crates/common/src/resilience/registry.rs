//! Keyed store for resilience policies.
//!
//! Policies are built once at startup from [`PolicyOptions`] and registered
//! under `{service}_{kind}` keys. Clients look their policies up by service
//! name when they are constructed, so a missing registration surfaces as a
//! construction error rather than a skipped policy at call time.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::retry::RetryPolicy;
use super::{ConfigError, FailurePredicate};

/// Kinds of policy a registry entry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Retry,
    CircuitBreaker,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "Retry"),
            Self::CircuitBreaker => write!(f, "CircuitBreaker"),
        }
    }
}

/// Tuning knobs for one service's retry and circuit breaker policies.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOptions {
    /// Number of retries after the initial attempt.
    pub retry_count: u32,
    /// Base of the exponential backoff schedule, in seconds.
    pub retry_backoff_power: f64,
    /// Consecutive handled failures before the circuit opens.
    pub circuit_breaker_tolerance_count: u32,
    /// How long the circuit stays open once tripped.
    pub circuit_breaker_break_duration: Duration,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_backoff_power: 2.0,
            circuit_breaker_tolerance_count: 5,
            circuit_breaker_break_duration: Duration::from_secs(15),
        }
    }
}

/// Registry lookup and registration failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A policy is already registered under this key.
    #[error("policy already registered under key '{key}'")]
    Duplicate {
        /// The contested registry key.
        key: String,
    },
    /// No policy is registered under this key.
    #[error("no policy registered under key '{key}'")]
    NotFound {
        /// The missing registry key.
        key: String,
    },
    /// The supplied options could not be turned into a policy.
    #[error("policy configuration rejected")]
    Config(#[from] ConfigError),
}

enum PolicyEntry<E> {
    Retry(Arc<RetryPolicy<E>>),
    CircuitBreaker(Arc<CircuitBreaker<E>>),
}

impl<E> Clone for PolicyEntry<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Retry(policy) => Self::Retry(Arc::clone(policy)),
            Self::CircuitBreaker(breaker) => Self::CircuitBreaker(Arc::clone(breaker)),
        }
    }
}

/// Registry of resilience policies keyed by `{service}_{kind}`.
///
/// The registry owns one retry policy and one circuit breaker per registered
/// service; every client of that service shares the same instances, so the
/// breaker state reflects the health of the dependency as a whole.
pub struct PolicyRegistry<E> {
    entries: RwLock<HashMap<String, PolicyEntry<E>>>,
}

impl<E> fmt::Debug for PolicyRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = match self.entries.read() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => vec![],
        };
        f.debug_struct("PolicyRegistry").field("keys", &keys).finish()
    }
}

impl<E> Default for PolicyRegistry<E>
where
    E: fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> PolicyRegistry<E>
where
    E: fmt::Display,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    fn key(service: &str, kind: PolicyKind) -> String {
        format!("{service}_{kind}")
    }

    /// Build and register a retry policy and a circuit breaker for `service`.
    ///
    /// Both policies classify failures through the same `handles` predicate.
    /// Fails if either key is already taken, leaving any policy registered
    /// before the collision in place.
    pub fn add_policies(
        &self,
        service: &str,
        options: &PolicyOptions,
        handles: FailurePredicate<E>,
    ) -> Result<(), RegistryError> {
        let retry =
            RetryPolicy::new(options.retry_count, options.retry_backoff_power, Arc::clone(&handles))?;
        let breaker_config = CircuitBreakerConfig {
            tolerance_count: options.circuit_breaker_tolerance_count,
            break_duration: options.circuit_breaker_break_duration,
        };
        let breaker = CircuitBreaker::new(breaker_config, handles)?;

        self.insert(service, PolicyKind::Retry, PolicyEntry::Retry(Arc::new(retry)))?;
        self.insert(
            service,
            PolicyKind::CircuitBreaker,
            PolicyEntry::CircuitBreaker(Arc::new(breaker)),
        )?;

        debug!(service, ?options, "registered resilience policies");
        Ok(())
    }

    fn insert(
        &self,
        service: &str,
        kind: PolicyKind,
        entry: PolicyEntry<E>,
    ) -> Result<(), RegistryError> {
        let key = Self::key(service, kind);
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => {
                warn!("policy registry lock poisoned");
                poisoned.into_inner()
            }
        };
        if entries.contains_key(&key) {
            return Err(RegistryError::Duplicate { key });
        }
        entries.insert(key, entry);
        Ok(())
    }

    fn get(&self, service: &str, kind: PolicyKind) -> Result<PolicyEntry<E>, RegistryError> {
        let key = Self::key(service, kind);
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => {
                warn!("policy registry lock poisoned");
                poisoned.into_inner()
            }
        };
        entries.get(&key).cloned().ok_or(RegistryError::NotFound { key })
    }

    /// Look up the retry policy registered for `service`.
    pub fn retry(&self, service: &str) -> Result<Arc<RetryPolicy<E>>, RegistryError> {
        match self.get(service, PolicyKind::Retry)? {
            PolicyEntry::Retry(policy) => Ok(policy),
            PolicyEntry::CircuitBreaker(_) => {
                Err(RegistryError::NotFound { key: Self::key(service, PolicyKind::Retry) })
            }
        }
    }

    /// Look up the circuit breaker registered for `service`.
    pub fn circuit_breaker(&self, service: &str) -> Result<Arc<CircuitBreaker<E>>, RegistryError> {
        match self.get(service, PolicyKind::CircuitBreaker)? {
            PolicyEntry::CircuitBreaker(breaker) => Ok(breaker),
            PolicyEntry::Retry(_) => {
                Err(RegistryError::NotFound { key: Self::key(service, PolicyKind::CircuitBreaker) })
            }
        }
    }
}
