use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    /// No usable credentials, or the upstream rejected a freshly refreshed token.
    #[error("credentials missing or rejected - login required")]
    CredentialsMissing,
    #[error("upstream returned http {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid channel slug: {0:?}")]
    InvalidSlug(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("token provider failed: {0}")]
    Token(String),
}

impl StatusError {
    /// Whether the operator has to log in again before this can succeed.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::CredentialsMissing)
    }
}

/// Error surfaced by an [`crate::AccessTokenProvider`].
#[derive(Debug, Clone, Error)]
pub enum TokenProviderError {
    #[error("no credentials stored")]
    Missing,
    #[error("{0}")]
    Other(String),
}

impl From<TokenProviderError> for StatusError {
    fn from(err: TokenProviderError) -> Self {
        match err {
            TokenProviderError::Missing => StatusError::CredentialsMissing,
            TokenProviderError::Other(msg) => StatusError::Token(msg),
        }
    }
}
