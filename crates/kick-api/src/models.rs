//! Wire models for the channel endpoints.
//!
//! The upstream is inconsistent about shapes: the channel may arrive as a
//! list, a single object or bare, and image/category fields are either plain
//! strings or nested objects. Everything is decoded into these unions and then
//! coalesced into one [`ChannelStatus`].

use serde::Deserialize;

use crate::status::ChannelStatus;

/// Status text used when a live channel has no title of any kind.
pub const LIVE_MARKER: &str = "LIVE";

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum ChannelResponse {
    List { data: Vec<ChannelPayload> },
    Single { data: ChannelPayload },
    Bare(ChannelPayload),
}

impl ChannelResponse {
    /// First channel in the response, if any.
    pub fn into_channel(self) -> Option<ChannelPayload> {
        let channel = match self {
            ChannelResponse::List { data } => data.into_iter().next(),
            ChannelResponse::Single { data } => Some(data),
            ChannelResponse::Bare(payload) => Some(payload),
        };
        channel.filter(|c| !c.is_empty())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub(crate) enum ImageRef {
    Url(String),
    Nested {
        url: Option<String>,
        src: Option<String>,
    },
}

impl ImageRef {
    pub fn into_url(self) -> Option<String> {
        let url = match self {
            ImageRef::Url(url) => Some(url),
            ImageRef::Nested { url, src } => url.or(src),
        };
        url.map(|u| u.trim().to_string())
            .filter(|u| is_web_image(u))
    }
}

/// Upstream images must be web URLs or inline data; anything else would be
/// resolved as a local path by image loaders.
pub(crate) fn is_web_image(url: &str) -> bool {
    let scheme = url.split_once(':').map(|(scheme, _)| scheme.to_ascii_lowercase());
    matches!(scheme.as_deref(), Some("http" | "https" | "data"))
        && url.len() > "data:".len()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub(crate) enum CategoryRef {
    Name(String),
    Object { name: Option<String> },
}

impl CategoryRef {
    fn into_name(self) -> Option<String> {
        let name = match self {
            CategoryRef::Name(name) => Some(name),
            CategoryRef::Object { name } => name,
        };
        name.filter(|n| !n.trim().is_empty())
    }
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct UserPayload {
    pub username: Option<String>,
    #[serde(alias = "profile_picture")]
    pub profile_pic: Option<ImageRef>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct StreamPayload {
    pub is_live: Option<bool>,
    #[serde(alias = "viewers")]
    pub viewer_count: Option<u64>,
    pub session_title: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ChannelPayload {
    pub slug: Option<String>,
    pub broadcaster_name: Option<String>,
    pub username: Option<String>,
    pub user: Option<UserPayload>,
    pub stream_title: Option<String>,
    pub category: Option<CategoryRef>,
    #[serde(alias = "livestream")]
    pub stream: Option<StreamPayload>,
    pub is_live: Option<bool>,
    pub viewer_count: Option<u64>,
    pub profile_picture: Option<ImageRef>,
}

impl ChannelPayload {
    fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.broadcaster_name.is_none()
            && self.username.is_none()
            && self.user.is_none()
            && self.stream.is_none()
            && self.is_live.is_none()
    }

    /// Collapse the payload into a status using the primary-source priorities.
    ///
    /// The display name is left empty when the payload does not carry one.
    pub fn into_status(self) -> ChannelStatus {
        let stream = self.stream.unwrap_or_default();
        let is_live = stream.is_live.or(self.is_live).unwrap_or(false);

        let (user_name, user_picture) = match self.user {
            Some(user) => (user.username, user.profile_pic),
            None => (None, None),
        };

        let display_name = first_non_blank([self.broadcaster_name, user_name, self.username])
            .unwrap_or_default();

        let profile_image_url = self
            .profile_picture
            .or(user_picture)
            .and_then(ImageRef::into_url);

        let live_status_text = if is_live {
            Some(
                first_non_blank([self.stream_title, stream.session_title, stream.status])
                    .unwrap_or_else(|| LIVE_MARKER.to_string()),
            )
        } else {
            None
        };

        ChannelStatus {
            is_live,
            display_name,
            profile_image_url,
            live_status_text,
            viewer_count: stream.viewer_count.or(self.viewer_count),
            category: self.category.and_then(CategoryRef::into_name),
        }
    }
}

/// Response of the public web channel page API used as a fallback.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct WebChannelResponse {
    pub user: Option<UserPayload>,
}

fn first_non_blank<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}
