use crate::config::ResyncConfig;
use chrono::{DateTime, Duration, Utc};
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncDecision {
    /// Gap small enough to trust that push delivery caught up.
    Trusted,
    /// Possible silent gap while backgrounded; reload everything.
    Reload,
}

/// Tracks the last confirmed push-subscription activity, including the
/// subscription's own connected acknowledgment. Push services commonly
/// suspend delivery for backgrounded tabs without replaying what was
/// missed, so a hard threshold bounds the blast radius of a silent gap.
pub struct ResyncMonitor {
    last_activity: DateTime<Utc>,
    threshold: Duration,
    debounce: std::time::Duration,
}

impl ResyncMonitor {
    pub fn new(config: &ResyncConfig, now: DateTime<Utc>) -> Self {
        Self {
            last_activity: now,
            threshold: Duration::seconds(config.threshold_seconds),
            debounce: std::time::Duration::from_millis(config.debounce_ms),
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// The decision itself, separated from the debounce so it stays a pure
    /// wall-clock comparison.
    pub fn decide(&mut self, now: DateTime<Utc>) -> ResyncDecision {
        let decision = if now - self.last_activity > self.threshold {
            ResyncDecision::Reload
        } else {
            ResyncDecision::Trusted
        };
        self.last_activity = now;
        decision
    }

    /// The host page became visible again.
    pub async fn on_visible(&mut self) -> ResyncDecision {
        sleep(self.debounce).await;
        self.decide(Utc::now())
    }
}
