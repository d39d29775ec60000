//! Client configuration
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment variables, then command-line overrides applied by the
//! binary. Every source goes through `validate()` before a client is built.

use crate::tap::error::{Result, TapError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `timeout_secs`
pub const ENV_TIMEOUT: &str = "VO_TAP_TIMEOUT";
/// Environment variable overriding `retries`
pub const ENV_RETRIES: &str = "VO_TAP_RETRIES";
/// Environment variable overriding `maxrec`
pub const ENV_MAXREC: &str = "VO_TAP_MAXREC";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Total number of attempts per request (1 = no retry)
    pub retries: u32,

    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Row limit forwarded to the service as MAXREC (None = service default)
    pub maxrec: Option<u64>,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retries: 2,
            retry_delay_ms: 500,
            maxrec: None,
            user_agent: concat!("vo-tap/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TapError::Config(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(raw)
            .map_err(|e| TapError::Config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `VO_TAP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `VO_TAP_*` environment variables on top of this configuration
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            self.timeout_secs = parse_env(ENV_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRIES) {
            self.retries = parse_env(ENV_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAXREC) {
            self.maxrec = Some(parse_env(ENV_MAXREC, &raw)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values that would make every request fail
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(TapError::Config("timeout_secs must be at least 1".into()));
        }
        if self.retries == 0 {
            return Err(TapError::Config(
                "retries is the total number of attempts and must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| TapError::Config(format!("{} has invalid value '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.retries, 2);
        assert_eq!(config.maxrec, None);
        assert!(config.user_agent.starts_with("vo-tap/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_keeps_defaults() {
        let config = ClientConfig::from_json_str(r#"{"timeout_secs": 5, "maxrec": 100}"#).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.maxrec, Some(100));
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn test_json_rejects_unknown_and_invalid() {
        assert!(ClientConfig::from_json_str(r#"{"timeout": 5}"#).is_err());
        assert!(ClientConfig::from_json_str(r#"{"retries": 0}"#).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_RETRIES, "4"), (ENV_MAXREC, " 10 ")].into();
        let config = ClientConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.retries, 4);
        assert_eq!(config.maxrec, Some(10));
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_overrides_invalid_value() {
        let err = ClientConfig::default()
            .with_overrides(|k| (k == ENV_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, TapError::Config(_)));
    }
}
