//! Bearer-token acquisition boundary.

use async_trait::async_trait;

use crate::error::ClientError;

/// Provides bearer tokens to authorize Contracts Data API calls.
///
/// Tokens are requested before every call, so providers are free to cache,
/// refresh, or fetch on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Retrieve a bearer token for the Authorization header.
    async fn access_token(&self) -> Result<String, ClientError>;
}

/// Token provider returning a fixed token (useful for testing).
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider that always yields `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, ClientError> {
        Ok(self.token.clone())
    }
}
