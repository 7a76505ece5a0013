//! OAuth token endpoint client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::error::CredentialError;
use super::types::{CredentialSet, TokenResponse};

/// Exchanges a refresh token for a new token response.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(
        &self,
        credentials: &CredentialSet,
        refresh_token: &str,
    ) -> Result<TokenResponse, CredentialError>;
}

pub struct HttpTokenEndpoint {
    client: Client,
}

impl HttpTokenEndpoint {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(
        &self,
        credentials: &CredentialSet,
        refresh_token: &str,
    ) -> Result<TokenResponse, CredentialError> {
        let endpoint = &credentials.server_metadata.token_endpoint;
        debug!(%endpoint, "Requesting token refresh");

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
        ];
        if !credentials.client_secret.is_empty() {
            form.push(("client_secret", credentials.client_secret.as_str()));
        }

        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CredentialError::RefreshRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
