use serde::{Deserialize, Serialize};

/// Snapshot of a channel as seen by one status request.
///
/// A fresh value is produced by every resolver call; consumers replace
/// their copy wholesale rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub is_live: bool,
    pub display_name: String,
    pub profile_image_url: Option<String>,
    pub live_status_text: Option<String>,
    pub viewer_count: Option<u64>,
    pub category: Option<String>,
}

impl ChannelStatus {
    /// An offline status carrying only a name.
    pub fn offline(display_name: impl Into<String>) -> Self {
        Self {
            is_live: false,
            display_name: display_name.into(),
            profile_image_url: None,
            live_status_text: None,
            viewer_count: None,
            category: None,
        }
    }
}

/// Outcome of resolving a slug. Not-found is a status, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(ChannelStatus),
    NotFound,
}

impl Lookup {
    pub fn found(self) -> Option<ChannelStatus> {
        match self {
            Lookup::Found(status) => Some(status),
            Lookup::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }
}

/// Normalize a user-supplied channel identifier into a slug.
pub fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("  XQc "), "xqc");
        assert_eq!(normalize_slug("already"), "already");
        assert_eq!(normalize_slug("   "), "");
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ChannelStatus::offline("Someone");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isLive"], false);
        assert_eq!(json["displayName"], "Someone");
        assert!(json.get("profileImageUrl").is_some());
    }
}
