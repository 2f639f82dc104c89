use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_USERNAME: &str = "Twitch Drops Miner";
pub const DEFAULT_AVATAR_URL: &str =
    "https://raw.githubusercontent.com/DevilXD/TwitchDropsMiner/refs/heads/master/icons/pickaxe.ico";

/// Tunables for the notification dispatcher.
///
/// Destinations are not part of this struct; they are supplied through
/// [`Dispatcher::reload`](crate::Dispatcher::reload) whenever settings change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Short-burst cap on direct webhook posts.
    pub burst_capacity: u32,
    pub burst_window_secs: u64,

    /// Sustained cap on direct webhook posts.
    pub sustained_capacity: u32,
    pub sustained_window_secs: u64,

    /// Per-request timeout used by the generic broker.
    pub timeout_secs: u64,

    /// User agent sent by the generic broker.
    pub user_agent: String,

    /// Display name attached to direct webhook messages.
    pub username: String,

    /// Avatar attached to direct webhook messages.
    pub avatar_url: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            burst_capacity: 50,
            burst_window_secs: 1,
            sustained_capacity: 30,
            sustained_window_secs: 60,
            timeout_secs: 10,
            user_agent: concat!("drop-notifier/", env!("CARGO_PKG_VERSION")).to_string(),
            username: DEFAULT_USERNAME.to_string(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

impl NotifierConfig {
    /// Defaults overlaid with any `NOTIFY_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// skipped and logged.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_number(&lookup, "NOTIFY_BURST_CAPACITY", &mut self.burst_capacity);
        override_number(&lookup, "NOTIFY_BURST_WINDOW_SECS", &mut self.burst_window_secs);
        override_number(&lookup, "NOTIFY_SUSTAINED_CAPACITY", &mut self.sustained_capacity);
        override_number(&lookup, "NOTIFY_SUSTAINED_WINDOW_SECS", &mut self.sustained_window_secs);
        override_number(&lookup, "NOTIFY_TIMEOUT_SECS", &mut self.timeout_secs);
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn override_number<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring invalid numeric override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_replace_defaults() {
        let env: HashMap<&str, &str> = [
            ("NOTIFY_BURST_CAPACITY", "5"),
            ("NOTIFY_SUSTAINED_WINDOW_SECS", " 120 "),
        ]
        .into_iter()
        .collect();

        let mut config = NotifierConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.burst_capacity, 5);
        assert_eq!(config.sustained_window_secs, 120);
        assert_eq!(config.sustained_capacity, 30);
    }

    #[test]
    fn invalid_override_is_ignored() {
        let mut config = NotifierConfig::default();
        config.apply_overrides(|key| (key == "NOTIFY_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: NotifierConfig = serde_json::from_str(r#"{"burst_capacity": 10}"#).unwrap();
        assert_eq!(config.burst_capacity, 10);
        assert_eq!(config.username, DEFAULT_USERNAME);
    }
}
