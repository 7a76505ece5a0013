//! Bearer token seam between the resolver and whoever owns the credentials.

use async_trait::async_trait;

use crate::error::TokenProviderError;

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A currently valid access token, refreshing first if it is about to expire.
    async fn access_token(&self) -> Result<String, TokenProviderError>;

    /// Refresh unconditionally and return the new access token.
    ///
    /// Called after the upstream rejected a token that looked valid locally.
    async fn force_refresh(&self) -> Result<String, TokenProviderError>;
}

/// Provider handing out a fixed token. Useful for tooling and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, TokenProviderError> {
        Ok(self.0.clone())
    }

    async fn force_refresh(&self) -> Result<String, TokenProviderError> {
        Ok(self.0.clone())
    }
}
