//! Conversation pacing and selection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::selector::SelectionPolicy;

/// Seconds between paced loop cycles.
pub const DEFAULT_PACE_SECONDS: u64 = 7;

/// Buffered events per observer before slow receivers start lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Process-wide conversation settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Sleep between paced loop cycles
    pub pace_interval: Duration,
    /// Speaker selection policy
    pub selection: SelectionPolicy,
    /// Seed for reproducible speaker draws
    pub seed: Option<u64>,
    /// Initial state of the auto-chat flag
    pub auto_chat: bool,
    /// Broadcast buffer size
    pub event_capacity: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            pace_interval: Duration::from_secs(DEFAULT_PACE_SECONDS),
            selection: SelectionPolicy::default(),
            seed: None,
            auto_chat: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ConversationConfig {
    /// Load from `CHORUS_PACE_SECONDS`, `CHORUS_SELECTION`, `CHORUS_SEED`
    /// and `CHORUS_AUTO_CHAT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("CHORUS_PACE_SECONDS") {
            match raw.trim().parse::<f64>().ok().and_then(pace_from_secs) {
                Some(interval) => config.pace_interval = interval,
                None => warn!("Ignoring invalid CHORUS_PACE_SECONDS value: {}", raw),
            }
        }

        if let Some(raw) = get("CHORUS_SELECTION") {
            match raw.parse() {
                Ok(policy) => config.selection = policy,
                Err(e) => warn!("Ignoring CHORUS_SELECTION: {}", e),
            }
        }

        if let Some(raw) = get("CHORUS_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(seed) => config.seed = Some(seed),
                Err(_) => warn!("Ignoring invalid CHORUS_SEED value: {}", raw),
            }
        }

        if let Some(raw) = get("CHORUS_AUTO_CHAT") {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => config.auto_chat = true,
                "0" | "false" | "off" | "no" => config.auto_chat = false,
                _ => warn!("Ignoring invalid CHORUS_AUTO_CHAT value: {}", raw),
            }
        }

        config
    }

    pub fn with_pace_interval(mut self, interval: Duration) -> Self {
        self.pace_interval = interval;
        self
    }

    pub fn with_selection(mut self, policy: SelectionPolicy) -> Self {
        self.selection = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_auto_chat(mut self, enabled: bool) -> Self {
        self.auto_chat = enabled;
        self
    }
}

/// A pace interval from seconds, or `None` unless positive and representable.
pub fn pace_from_secs(secs: f64) -> Option<Duration> {
    if secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConversationConfig::from_lookup(|_| None);
        assert_eq!(config.pace_interval, Duration::from_secs(7));
        assert_eq!(config.selection, SelectionPolicy::WeightedRandom);
        assert!(config.auto_chat);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = ConversationConfig::from_lookup(|key| match key {
            "CHORUS_PACE_SECONDS" => Some("2.5".to_string()),
            "CHORUS_SELECTION" => Some("round-robin".to_string()),
            "CHORUS_SEED" => Some("1234".to_string()),
            "CHORUS_AUTO_CHAT" => Some("off".to_string()),
            _ => None,
        });

        assert_eq!(config.pace_interval, Duration::from_millis(2500));
        assert_eq!(config.selection, SelectionPolicy::RoundRobin);
        assert_eq!(config.seed, Some(1234));
        assert!(!config.auto_chat);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = ConversationConfig::from_lookup(|key| match key {
            "CHORUS_PACE_SECONDS" => Some("-3".to_string()),
            "CHORUS_SELECTION" => Some("lottery".to_string()),
            _ => None,
        });
        assert_eq!(config.pace_interval, Duration::from_secs(DEFAULT_PACE_SECONDS));
        assert_eq!(config.selection, SelectionPolicy::WeightedRandom);
    }

    #[test]
    fn test_unrepresentable_pace_keeps_default() {
        for raw in ["1e30", "inf", "NaN"] {
            let config = ConversationConfig::from_lookup(|key| {
                (key == "CHORUS_PACE_SECONDS").then(|| raw.to_string())
            });
            assert_eq!(config.pace_interval, Duration::from_secs(DEFAULT_PACE_SECONDS));
        }
        assert_eq!(pace_from_secs(0.25), Some(Duration::from_millis(250)));
        assert_eq!(pace_from_secs(1e30), None);
    }
}
