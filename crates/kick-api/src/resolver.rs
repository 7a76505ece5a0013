//! Channel status resolution.
//!
//! Resolves a slug against the authorized public API, retrying once with a
//! refreshed token on 401, and patches deficient answers with the cached web
//! profile lookup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::AccessTokenProvider;
use crate::client::create_client_builder;
use crate::error::StatusError;
use crate::models::{ChannelPayload, ChannelResponse};
use crate::profile::{DEFAULT_PROFILE_TTL, ProfileLookup, WebProfile};
use crate::status::{ChannelStatus, Lookup, normalize_slug};

/// Source of channel status snapshots.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, slug: &str) -> Result<Lookup, StatusError>;
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub api_base_url: Url,
    pub web_base_url: Url,
    pub profile_ttl: Duration,
    /// Zero keeps the transport default.
    pub request_timeout: Duration,
}

impl ResolverConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.kick.com/";
    pub const DEFAULT_WEB_BASE: &'static str = "https://kick.com/";

    /// Config for the given API and web roots with default cache and timeout.
    ///
    /// A missing trailing slash is added so relative endpoint joins keep the
    /// full base path.
    pub fn with_bases(api_base: &str, web_base: &str) -> Result<Self, StatusError> {
        Ok(Self {
            api_base_url: base_url(api_base)?,
            web_base_url: base_url(web_base)?,
            profile_ttl: DEFAULT_PROFILE_TTL,
            request_timeout: Duration::ZERO,
        })
    }

    /// Config for the public Kick endpoints.
    pub fn kick() -> Result<Self, StatusError> {
        Self::with_bases(Self::DEFAULT_API_BASE, Self::DEFAULT_WEB_BASE)
    }
}

fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

pub struct StatusResolver {
    client: Client,
    api_base_url: Url,
    tokens: Arc<dyn AccessTokenProvider>,
    profiles: ProfileLookup,
}

impl StatusResolver {
    pub fn new(
        config: ResolverConfig,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, StatusError> {
        let client = create_client_builder(config.request_timeout).build()?;
        Ok(Self::with_client(client, config, tokens))
    }

    pub fn with_client(
        client: Client,
        config: ResolverConfig,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let profiles =
            ProfileLookup::with_ttl(client.clone(), config.web_base_url, config.profile_ttl);
        Self {
            client,
            api_base_url: config.api_base_url,
            tokens,
            profiles,
        }
    }

    async fn request(&self, slug: &str, token: &str) -> Result<Response, StatusError> {
        let mut url = self.api_base_url.join("public/v1/channels")?;
        url.query_pairs_mut().append_pair("slug", slug);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        Ok(response)
    }

    /// Authorized primary lookup. `None` means the channel does not exist.
    async fn fetch_primary(&self, slug: &str) -> Result<Option<ChannelPayload>, StatusError> {
        let token = self.tokens.access_token().await?;
        let mut response = self.request(slug, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(channel = %slug, "Access token rejected, refreshing and retrying once");
            let token = self.tokens.force_refresh().await?;
            response = self.request(slug, &token).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(StatusError::CredentialsMissing);
            }
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StatusError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(channel = %slug, "body: {}", body);
        let parsed: ChannelResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_channel())
    }
}

#[async_trait]
impl StatusSource for StatusResolver {
    #[instrument(skip(self))]
    async fn fetch_status(&self, slug: &str) -> Result<Lookup, StatusError> {
        let slug = normalize_slug(slug);
        validate_slug(&slug)?;

        let Some(payload) = self.fetch_primary(&slug).await? else {
            debug!(channel = %slug, "Channel not found");
            return Ok(Lookup::NotFound);
        };

        let mut status = payload.into_status();
        if needs_profile_lookup(&status, &slug) {
            if let Some(profile) = self.profiles.lookup(&slug).await {
                status = coalesce(status, profile, &slug);
            }
        }
        if status.display_name.trim().is_empty() {
            status.display_name = slug;
        }

        Ok(Lookup::Found(status))
    }
}

fn validate_slug(slug: &str) -> Result<(), StatusError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StatusError::InvalidSlug(slug.to_string()))
    }
}

/// A display name that is empty or just the slug is treated as missing.
fn display_name_is_deficient(name: &str, slug: &str) -> bool {
    name.trim().is_empty() || name == slug
}

pub(crate) fn needs_profile_lookup(status: &ChannelStatus, slug: &str) -> bool {
    status.profile_image_url.is_none() || display_name_is_deficient(&status.display_name, slug)
}

/// Merge a web profile into a primary status. The primary answer wins unless
/// it is deficient.
pub(crate) fn coalesce(mut status: ChannelStatus, profile: WebProfile, slug: &str) -> ChannelStatus {
    if display_name_is_deficient(&status.display_name, slug) {
        if let Some(name) = profile.display_name {
            status.display_name = name;
        }
    }
    if status.profile_image_url.is_none() {
        status.profile_image_url = profile.profile_image_url;
    }
    status
}
