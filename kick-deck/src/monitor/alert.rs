//! Alert cycle bookkeeping.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

/// A running flash cycle. The first frame is "on".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCycle {
    pub end_time: Instant,
    pub toggle: bool,
    pub alerting: BTreeSet<String>,
}

impl AlertCycle {
    pub fn start(alerting: BTreeSet<String>, duration: Duration) -> Self {
        Self {
            end_time: Instant::now() + duration,
            toggle: true,
            alerting,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.end_time
    }

    /// Flip to the next frame, returning the new toggle state.
    pub fn flip(&mut self) -> bool {
        self.toggle = !self.toggle;
        self.toggle
    }

    /// Whether `slug` should be drawn in the flash color on this frame.
    pub fn is_lit(&self, slug: &str) -> bool {
        self.toggle && self.alerting.contains(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cycle_flips_and_expires() {
        let mut cycle = AlertCycle::start(BTreeSet::from(["a".to_string()]), Duration::from_secs(60));
        assert!(cycle.is_lit("a"));
        assert!(!cycle.is_lit("b"));

        assert!(!cycle.flip());
        assert!(!cycle.is_lit("a"));
        assert!(cycle.flip());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!cycle.is_expired(Instant::now()));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cycle.is_expired(Instant::now()));
    }
}
