use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Who hears about a request when several callers asked for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberPolicy {
    /// Every caller's callback runs once.
    FanOut,
    /// Only the most recent caller's callback runs.
    LastWins,
}

/// Tunables for the shared polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between refreshes of the shared record view.
    pub interval_secs: u64,

    /// Budget per request, measured from the first `add_request`.
    pub max_duration_secs: u64,

    /// Upper bound on a single refresh before the tick gives up on it.
    pub refresh_timeout_secs: u64,

    pub subscriber_policy: SubscriberPolicy,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_duration_secs: 60,
            refresh_timeout_secs: 30,
            subscriber_policy: SubscriberPolicy::FanOut,
        }
    }
}
