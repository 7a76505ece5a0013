//! Per-channel fetch results and the multi-channel aggregate.

use std::fmt;

use kick_api::{ChannelStatus, Lookup, StatusError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Live,
    Offline,
    Error,
    NotFound,
    Unknown,
}

impl MonitorStatus {
    /// Title label shown under the channel name.
    pub fn label(&self) -> &'static str {
        match self {
            MonitorStatus::Live => "LIVE",
            MonitorStatus::Offline => "OFFLINE",
            MonitorStatus::Error => "ERROR",
            MonitorStatus::NotFound => "NOT FOUND",
            MonitorStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(ChannelStatus),
    NotFound,
    /// The fetch failed; the channel counts as errored for this poll only.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResult {
    /// Configured slug this result belongs to.
    pub slug: String,
    pub outcome: FetchOutcome,
}

impl ChannelResult {
    pub fn new(slug: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self {
            slug: slug.into(),
            outcome,
        }
    }

    pub fn from_lookup(slug: &str, lookup: Result<Lookup, StatusError>) -> Self {
        let outcome = match lookup {
            Ok(Lookup::Found(status)) => FetchOutcome::Found(status),
            Ok(Lookup::NotFound) => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::Failed(e.to_string()),
        };
        Self::new(slug, outcome)
    }

    pub fn status(&self) -> MonitorStatus {
        match &self.outcome {
            FetchOutcome::Found(s) if s.is_live => MonitorStatus::Live,
            FetchOutcome::Found(_) => MonitorStatus::Offline,
            FetchOutcome::NotFound => MonitorStatus::NotFound,
            FetchOutcome::Failed(_) => MonitorStatus::Error,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(&self.outcome, FetchOutcome::Found(s) if s.is_live)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.outcome, FetchOutcome::NotFound)
    }

    pub fn channel(&self) -> Option<&ChannelStatus> {
        match &self.outcome {
            FetchOutcome::Found(s) => Some(s),
            _ => None,
        }
    }

    /// Resolved display name, or the slug when the fetch gave none.
    pub fn display_name(&self) -> &str {
        self.channel()
            .map(|s| s.display_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.slug)
    }

    /// Display name as reported upstream; `None` for errors and misses.
    pub fn known_name(&self) -> Option<&str> {
        self.channel()
            .map(|s| s.display_name.as_str())
            .filter(|n| !n.is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.channel().and_then(|s| s.category.as_deref())
    }

    pub fn profile_image(&self) -> Option<&str> {
        self.channel().and_then(|s| s.profile_image_url.as_deref())
    }
}

/// Combine valid (non-not-found) results into one synthetic status.
///
/// Live if any channel is live. The name lists live channels one per line,
/// or the only channel when exactly one is valid and none is live. Viewer
/// counts add up; the category comes from the first live channel, else the
/// first valid one.
pub fn aggregate(results: &[ChannelResult]) -> ChannelStatus {
    let valid: Vec<&ChannelResult> = results.iter().filter(|r| !r.is_not_found()).collect();
    let live: Vec<&ChannelResult> = valid.iter().copied().filter(|r| r.is_live()).collect();

    let display_name = if !live.is_empty() {
        live.iter()
            .map(|r| r.display_name())
            .collect::<Vec<_>>()
            .join("\n")
    } else if valid.len() == 1 {
        valid[0].display_name().to_string()
    } else {
        String::new()
    };

    let viewer_count = valid
        .iter()
        .filter_map(|r| r.channel().and_then(|s| s.viewer_count))
        .reduce(|a, b| a + b);

    let category = live
        .iter()
        .find_map(|r| r.category())
        .or_else(|| valid.first().and_then(|r| r.category()))
        .map(str::to_string);

    ChannelStatus {
        is_live: !live.is_empty(),
        display_name,
        profile_image_url: None,
        live_status_text: None,
        viewer_count,
        category,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn found(slug: &str, name: &str, live: bool) -> ChannelResult {
        ChannelResult::new(
            slug,
            FetchOutcome::Found(ChannelStatus {
                is_live: live,
                display_name: name.to_string(),
                profile_image_url: Some(format!("data:image/png;base64,{slug}")),
                live_status_text: live.then(|| "LIVE".to_string()),
                viewer_count: live.then_some(100),
                category: Some(format!("{name} category")),
            }),
        )
    }

    pub fn not_found(slug: &str) -> ChannelResult {
        ChannelResult::new(slug, FetchOutcome::NotFound)
    }

    pub fn failed(slug: &str) -> ChannelResult {
        ChannelResult::new(slug, FetchOutcome::Failed("upstream returned http 500".into()))
    }
}
