//! Client configuration, loaded once per process.

use std::time::Duration;

use contracts_common::resilience::PolicyOptions;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Tuning for the retry and circuit breaker policies.
///
/// Field names match the `HttpPolicyOptions` configuration section consumed
/// by the other clients of this API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HttpPolicyOptions {
    /// Retries after the initial attempt.
    pub http_retry_count: u32,
    /// Base of the exponential backoff schedule, in seconds.
    pub http_retry_backoff_power: f64,
    /// Consecutive transient failures before the circuit opens.
    pub circuit_breaker_tolerance_count: u32,
    /// Seconds the circuit stays open once tripped.
    #[serde(rename = "CircuitBreakerDurationOfBreak")]
    pub circuit_breaker_duration_of_break_secs: u64,
}

impl Default for HttpPolicyOptions {
    fn default() -> Self {
        Self {
            http_retry_count: 3,
            http_retry_backoff_power: 2.0,
            circuit_breaker_tolerance_count: 5,
            circuit_breaker_duration_of_break_secs: 15,
        }
    }
}

impl HttpPolicyOptions {
    /// Convert to the options the policy registry builds from.
    pub fn to_policy_options(&self) -> PolicyOptions {
        PolicyOptions {
            retry_count: self.http_retry_count,
            retry_backoff_power: self.http_retry_backoff_power,
            circuit_breaker_tolerance_count: self.circuit_breaker_tolerance_count,
            circuit_breaker_break_duration: Duration::from_secs(
                self.circuit_breaker_duration_of_break_secs,
            ),
        }
    }
}

/// Where the Contracts Data API lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContractsDataApiConfiguration {
    /// Base address of the API. Paths are joined relative to it, so a
    /// non-root base must end with a trailing slash.
    pub api_base_address: Url,
}

/// Top-level configuration file shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientConfig {
    pub contracts_data_api: ContractsDataApiConfiguration,
    #[serde(default)]
    pub http_policy_options: HttpPolicyOptions,
}

/// Configuration file could not be parsed.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to parse client configuration")]
    Parse(#[from] toml::de::Error),
}

impl ClientConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(raw)?)
    }
}
