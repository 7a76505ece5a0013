//! Offline-to-live transition detection across polls.

use std::collections::BTreeSet;

use super::results::ChannelResult;

/// Channels that went from not live to live between two polls.
///
/// When both result lists still line up with the configured channels, results
/// are paired by position and identified by the configured slug. Otherwise
/// (some channel was dropped as not found) pairs are matched by display name;
/// channels without a known name cannot be paired and never alert.
pub fn detect_transitions(
    configured: &[String],
    previous: &[ChannelResult],
    current: &[ChannelResult],
) -> BTreeSet<String> {
    let aligned = previous.len() == configured.len() && current.len() == configured.len();

    if aligned {
        return configured
            .iter()
            .zip(previous.iter().zip(current))
            .filter(|(_, (prev, next))| !prev.is_live() && next.is_live())
            .map(|(slug, _)| slug.clone())
            .collect();
    }

    current
        .iter()
        .filter(|next| next.is_live())
        .filter_map(|next| {
            let name = next.known_name()?;
            let prev = previous.iter().find(|p| p.known_name() == Some(name))?;
            (!prev.is_live()).then(|| next.slug.clone())
        })
        .collect()
}
