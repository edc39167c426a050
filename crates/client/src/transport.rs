//! Resilient HTTP transport for the Contracts Data API.
//!
//! Layers the registry's policies around `reqwest`, outermost to innermost:
//! retry, then circuit breaker, then the network. Each retry attempt restarts
//! the whole protected operation, so it re-checks the circuit; if the breaker
//! opens mid-sequence, the remaining attempts fail fast without touching the
//! network.

use std::sync::Arc;

use contracts_common::resilience::{
    CircuitBreaker, CircuitBreakerError, FailurePredicate, PolicyRegistry, RegistryError,
    RetryPolicy,
};
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// HTTP transport wrapped in the retry and circuit breaker policies
/// registered for one logical service.
pub struct ResilientTransport {
    http: reqwest::Client,
    retry: Arc<RetryPolicy<TransportError>>,
    breaker: Arc<CircuitBreaker<TransportError>>,
}

impl ResilientTransport {
    /// The failure predicate both policies classify with: network errors,
    /// 5xx responses, and request timeouts are handled; everything else
    /// passes through.
    pub fn transient_failures() -> FailurePredicate<TransportError> {
        Arc::new(TransportError::is_transient)
    }

    /// Resolve the policies registered for `service` and wrap `http` in
    /// them. Fails fast if either policy was never registered.
    pub fn from_registry(
        http: reqwest::Client,
        registry: &PolicyRegistry<TransportError>,
        service: &str,
    ) -> Result<Self, RegistryError> {
        let retry = registry.retry(service)?;
        let breaker = registry.circuit_breaker(service)?;
        Ok(Self { http, retry, breaker })
    }

    /// Start building a request against `url`.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Send a request through the policy stack.
    ///
    /// The builder is cloned per attempt so retries re-issue the full
    /// request; builders with streaming bodies cannot be cloned and are
    /// rejected up front.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let breaker = &self.breaker;
        self.retry
            .execute(|| {
                let attempt = request.try_clone();
                async move {
                    let attempt = attempt.ok_or_else(|| {
                        TransportError::Request(
                            "request body cannot be cloned for retries".to_string(),
                        )
                    })?;
                    match breaker.execute(|| Self::attempt(attempt)).await {
                        Ok(response) => Ok(response),
                        Err(CircuitBreakerError::Open) => Err(TransportError::BrokenCircuit),
                        Err(CircuitBreakerError::Inner(error)) => Err(error),
                    }
                }
            })
            .await
    }

    async fn attempt(request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(%status, "contracts data api call succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Http { status, body })
    }
}
