//! Status image rendering.
//!
//! [`ImageCompositor`] turns a channel picture plus live state into a button
//! image, caching single renders and composing multi-channel collages.

mod cache;
mod collage;
mod source;
mod svg;
mod text;

use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

pub use cache::{CacheConfig, CacheKey, ImageCache};
pub use collage::{BORDER_GAP, CORNER_RADIUS, MAX_TILES, Tile, collage_svg, tile_path};
pub use source::{ImageLoader, ImageSource, mime_for_path, to_data_uri};
pub use svg::{
    CANVAS, FLASH_COLOR, LIVE_COLOR, OFFLINE_COLOR, flash_square, indicator, live_indicator,
    offline_indicator, single_svg, svg_data_uri,
};
pub use text::{
    SUBTITLE_WRAP, TextOverlay, escape_xml, layout, subtitle_font_size, title_font_size,
    wrap_text,
};

#[cfg(test)]
pub(crate) use svg::decode_data_uri;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image source error: {0}")]
    Source(String),

    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One channel in a collage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollageItem {
    /// Image reference (data URI, URL or file path).
    pub image: Option<String>,
    pub live: bool,
    pub flashing: bool,
}

pub struct ImageCompositor {
    loader: ImageLoader,
    cache: ImageCache,
}

impl ImageCompositor {
    pub fn new(client: Client, config: CacheConfig) -> Self {
        Self {
            loader: ImageLoader::with_ttl(client, config.ttl),
            cache: ImageCache::new(config),
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Render one bordered status image, served from cache when possible.
    pub async fn render(
        &self,
        image: &str,
        live: bool,
        overlay: Option<&TextOverlay>,
    ) -> Result<Arc<str>, RenderError> {
        let key = CacheKey {
            reference: image.to_string(),
            live,
            overlay: match overlay {
                Some(overlay) => serde_json::to_string(overlay)?,
                None => String::new(),
            },
        };

        if let Some(hit) = self.cache.get(&key) {
            debug!(live, "Image cache hit");
            return Ok(hit);
        }

        let embedded = self.loader.load(image).await?;
        let rendered: Arc<str> = Arc::from(svg_data_uri(&single_svg(&embedded, live, overlay)));
        self.cache.insert(key, rendered.clone());
        Ok(rendered)
    }

    /// Compose up to four channels into one image.
    ///
    /// A single item goes through [`ImageCompositor::render`], or becomes the
    /// solid flash square when flashing. Tiles whose picture fails to load are
    /// drawn dark instead of failing the whole collage.
    pub async fn collage(
        &self,
        items: &[CollageItem],
        overlay: Option<&TextOverlay>,
    ) -> Result<String, RenderError> {
        let items = &items[..items.len().min(MAX_TILES)];

        match items {
            [] => Ok(offline_indicator().to_string()),
            [item] if item.flashing => Ok(flash_square().to_string()),
            [item] => match &item.image {
                Some(image) => Ok(self.render(image, item.live, overlay).await?.to_string()),
                None => Ok(indicator(item.live).to_string()),
            },
            _ => {
                let loads = items.iter().map(|item| async move {
                    let image = match (&item.image, item.flashing) {
                        (Some(reference), false) => match self.loader.load(reference).await {
                            Ok(uri) => Some(uri),
                            Err(e) => {
                                warn!(error = %e, "Failed to load collage tile image");
                                None
                            }
                        },
                        _ => None,
                    };
                    Tile {
                        image,
                        live: item.live,
                        flashing: item.flashing,
                    }
                });
                let tiles = futures::future::join_all(loads).await;
                Ok(svg_data_uri(&collage_svg(&tiles, overlay)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kick_api::client::default_client;

    const IMG: &str = "data:image/png;base64,AA==";

    fn compositor() -> ImageCompositor {
        ImageCompositor::new(default_client().unwrap(), CacheConfig::default())
    }

    fn item(live: bool, flashing: bool) -> CollageItem {
        CollageItem {
            image: Some(IMG.to_string()),
            live,
            flashing,
        }
    }

    #[tokio::test]
    async fn test_render_is_cached_and_byte_identical() {
        let compositor = compositor();
        let overlay = TextOverlay::with_wrapped_subtitle("xqc", Some("Just Chatting"));

        let first = compositor.render(IMG, true, Some(&overlay)).await.unwrap();
        let second = compositor.render(IMG, true, Some(&overlay)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(compositor.cache().len(), 1);
        assert!(first.starts_with("data:image/svg+xml;base64,"));
    }

    #[tokio::test]
    async fn test_live_flag_and_overlay_are_part_of_the_key() {
        let compositor = compositor();
        compositor.render(IMG, true, None).await.unwrap();
        compositor.render(IMG, false, None).await.unwrap();
        compositor
            .render(IMG, true, Some(&TextOverlay::title("xqc")))
            .await
            .unwrap();
        assert_eq!(compositor.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_source_fails() {
        let err = compositor()
            .render("/nope/avatar.png", true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Source(_)));
    }

    #[tokio::test]
    async fn test_single_flashing_item_is_flash_square() {
        let compositor = compositor();
        let image = compositor.collage(&[item(true, true)], None).await.unwrap();
        assert_eq!(image, flash_square());
        assert!(compositor.cache().is_empty());
    }

    #[tokio::test]
    async fn test_single_item_delegates_to_render() {
        let compositor = compositor();
        let image = compositor.collage(&[item(false, false)], None).await.unwrap();
        assert_eq!(&*compositor.render(IMG, false, None).await.unwrap(), image);
        assert_eq!(compositor.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_collage_survives_broken_tile() {
        let compositor = compositor();
        let broken = CollageItem {
            image: Some("/nope.png".to_string()),
            live: false,
            flashing: false,
        };
        let image = compositor
            .collage(&[item(true, false), broken, item(false, true)], None)
            .await
            .unwrap();

        let svg = decode_data_uri(&image);
        assert_eq!(svg.matches("<clipPath").count(), 3);
        assert_eq!(svg.matches("<pattern").count(), 1);
        assert_eq!(svg.matches(r#"class="tile-border""#).count(), 3);
    }
}
