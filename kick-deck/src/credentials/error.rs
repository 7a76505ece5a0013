//! Credential error types.

use kick_api::TokenProviderError;
use thiserror::Error;

/// Errors that can occur during credential operations.
///
/// Cloneable so a single in-flight refresh can hand the same outcome to every
/// waiting caller.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// Nothing stored - login required.
    #[error("No credentials stored - login required")]
    MissingCredentials,

    /// Missing refresh token - re-login required.
    #[error("Missing refresh token - re-login required")]
    MissingRefreshToken,

    /// Token endpoint answered with a non-2xx status.
    #[error("Token refresh rejected (http {status}): {body}")]
    RefreshRejected { status: u16, body: String },

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Persistence target failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A different storage backend was already selected for this process.
    #[error("Credential backend already selected as {current}, refusing {requested}")]
    ConflictingBackend {
        current: &'static str,
        requested: &'static str,
    },

    /// External authorization flow failed.
    #[error("Authorization flow failed: {0}")]
    AuthFlow(String),

    /// The task driving a shared refresh went away before finishing.
    #[error("Token refresh abandoned before completion")]
    Abandoned,
}

impl CredentialError {
    /// Check if this error requires manual re-login.
    pub fn requires_relogin(&self) -> bool {
        match self {
            Self::MissingCredentials | Self::MissingRefreshToken => true,
            Self::RefreshRejected { status, .. } => matches!(status, 400 | 401),
            _ => false,
        }
    }

    /// Check if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Abandoned => true,
            Self::RefreshRejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CredentialError {
    fn from(err: reqwest::Error) -> Self {
        CredentialError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CredentialError {
    fn from(err: serde_json::Error) -> Self {
        CredentialError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CredentialError {
    fn from(err: std::io::Error) -> Self {
        CredentialError::Storage(err.to_string())
    }
}

impl From<crate::host::HostError> for CredentialError {
    fn from(err: crate::host::HostError) -> Self {
        CredentialError::Storage(err.to_string())
    }
}

impl From<CredentialError> for TokenProviderError {
    fn from(err: CredentialError) -> Self {
        if err.requires_relogin() {
            TokenProviderError::Missing
        } else {
            TokenProviderError::Other(err.to_string())
        }
    }
}
