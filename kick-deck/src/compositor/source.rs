//! Image source loading.
//!
//! Sources are referenced by string: a `data:` URI, an `http(s)` URL or a
//! local file path. Everything is turned into a data URI for embedding.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::time::Instant;
use tracing::debug;

use super::RenderError;

const DEFAULT_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    DataUri(&'a str),
    Remote(&'a str),
    File(&'a Path),
}

impl<'a> ImageSource<'a> {
    pub fn classify(reference: &'a str) -> Self {
        let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
        if lower.starts_with("data:") {
            ImageSource::DataUri(reference)
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageSource::Remote(reference)
        } else {
            ImageSource::File(Path::new(reference))
        }
    }
}

/// MIME type for a file, by extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => DEFAULT_MIME,
    }
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[derive(Clone)]
struct LoadedSource {
    uri: Arc<str>,
    expires_at: Instant,
}

/// Loads image references into embeddable data URIs.
///
/// Loaded remote and file sources are kept for `ttl` so collage frames
/// redrawn every alert tick do not refetch their pictures.
#[derive(Clone)]
pub struct ImageLoader {
    client: Client,
    loaded: Arc<DashMap<String, LoadedSource>>,
    ttl: Duration,
}

impl ImageLoader {
    pub fn new(client: Client) -> Self {
        Self::with_ttl(client, super::cache::DEFAULT_TTL)
    }

    pub fn with_ttl(client: Client, ttl: Duration) -> Self {
        Self {
            client,
            loaded: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub async fn load(&self, reference: &str) -> Result<String, RenderError> {
        if reference.trim().is_empty() {
            return Err(RenderError::Source("empty image reference".to_string()));
        }

        let source = ImageSource::classify(reference);
        if let ImageSource::DataUri(uri) = source {
            return Ok(uri.to_string());
        }

        if let Some(entry) = self.loaded.get(reference) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.uri.to_string());
            }
            drop(entry); // Release the lock before removing
            self.loaded.remove(reference);
        }

        let uri = match source {
            ImageSource::Remote(url) => self.fetch(url).await?,
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    RenderError::Source(format!("failed to read {}: {}", path.display(), e))
                })?;
                to_data_uri(mime_for_path(path), &bytes)
            }
            ImageSource::DataUri(uri) => uri.to_string(),
        };

        let now = Instant::now();
        self.loaded.retain(|_, entry| entry.expires_at > now);
        self.loaded.insert(
            reference.to_string(),
            LoadedSource {
                uri: Arc::from(uri.as_str()),
                expires_at: now + self.ttl,
            },
        );
        Ok(uri)
    }

    /// Number of sources currently held.
    pub fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    async fn fetch(&self, url: &str) -> Result<String, RenderError> {
        debug!(%url, "Fetching image");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Source(format!(
                "image request to {url} returned {status}"
            )));
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME.to_string());

        let bytes = response.bytes().await?;
        Ok(to_data_uri(&mime, &bytes))
    }
}
