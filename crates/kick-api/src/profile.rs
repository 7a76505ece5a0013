//! Secondary profile lookup against the public web API.
//!
//! The primary API frequently omits the display name and avatar. The web
//! endpoint has both, but is slower and rate limited, so answers are cached
//! per slug.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::StatusError;
use crate::models::{ImageRef, WebChannelResponse};

/// Default TTL for cached profiles (1 hour).
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebProfile {
    pub display_name: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Clone)]
struct CacheEntry {
    profile: Option<WebProfile>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Clone)]
pub struct ProfileLookup {
    client: Client,
    base_url: Url,
    cache: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ProfileLookup {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self::with_ttl(client, base_url, DEFAULT_PROFILE_TTL)
    }

    pub fn with_ttl(client: Client, base_url: Url, ttl: Duration) -> Self {
        Self {
            client,
            base_url,
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Look up a profile, serving from cache while fresh.
    ///
    /// Transport failures are logged and yield `None` without being cached;
    /// a definitive "no such user" answer is cached like a hit.
    pub async fn lookup(&self, slug: &str) -> Option<WebProfile> {
        if let Some(entry) = self.cache.get(slug) {
            if !entry.is_expired() {
                return entry.profile.clone();
            }
        }
        self.cache.remove_if(slug, |_, entry| entry.is_expired());

        match self.fetch(slug).await {
            Ok(profile) => {
                self.cache.insert(
                    slug.to_string(),
                    CacheEntry {
                        profile: profile.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
                profile
            }
            Err(e) => {
                debug!(channel = %slug, error = %e, "Web profile lookup failed");
                None
            }
        }
    }

    /// Number of cached answers, expired ones included.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    async fn fetch(&self, slug: &str) -> Result<Option<WebProfile>, StatusError> {
        let url = self.base_url.join(&format!("api/v2/channels/{slug}"))?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(StatusError::Http {
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        let parsed: WebChannelResponse = serde_json::from_str(&body)?;
        Ok(parsed.user.map(|user| WebProfile {
            display_name: user.username.filter(|name| !name.trim().is_empty()),
            profile_image_url: user.profile_pic.and_then(ImageRef::into_url),
        }))
    }
}
