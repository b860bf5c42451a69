use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::ProviderId;

/// Priority given to providers that do not set one. Lower values are tried first.
pub const DEFAULT_PROVIDER_PRIORITY: i32 = 100;

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i32 {
    DEFAULT_PROVIDER_PRIORITY
}

fn default_requests_per_window() -> u32 {
    60
}

fn default_window_seconds() -> u64 {
    60
}

fn default_timeout_seconds() -> u64 {
    10
}

/// Administrator-facing settings for one provider.
///
/// A `requests_per_window` of zero disables rate limiting for the provider.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub source_id: ProviderId,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,

    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl ProviderConfig {
    pub fn new(source_id: impl Into<ProviderId>) -> Self {
        Self {
            source_id: source_id.into(),
            enabled: default_enabled(),
            priority: default_priority(),
            requests_per_window: default_requests_per_window(),
            window_seconds: default_window_seconds(),
            timeout_seconds: default_timeout_seconds(),
            credential: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_window: u32, window_seconds: u64) -> Self {
        self.requests_per_window = requests_per_window;
        self.window_seconds = window_seconds;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Keep credentials out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("source_id", &self.source_id)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .field("requests_per_window", &self.requests_per_window)
            .field("window_seconds", &self.window_seconds)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: ProviderConfig = serde_json::from_str(r#"{"sourceId": "PRIMARY"}"#).unwrap();
        assert_eq!(config.source_id, "PRIMARY");
        assert!(config.enabled);
        assert_eq!(config.priority, DEFAULT_PROVIDER_PRIORITY);
        assert_eq!(config.requests_per_window, 60);
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let config = ProviderConfig::new("PRIMARY").with_credential("secret-key");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("***"));
    }
}
