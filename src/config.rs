//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `TOXISCOPE_PORT` | `3000` |
//! | `TOXISCOPE_DATABASE_URL` | `sqlite:toxiscope.db?mode=rwc` |
//! | `TOXISCOPE_GEMINI_BASE_URL` | Gemini public endpoint |
//! | `TOXISCOPE_GEMINI_MODEL` | `gemini-2.0-flash` |
//! | `TOXISCOPE_REQUEST_TIMEOUT_SECS` | `30` |
//! | `TOXISCOPE_RELAY_URL` | unset (relay client disabled) |
//! | `TOXISCOPE_HISTORY_RETENTION` | `1000` analyses |
//!
//! Unparseable numeric values fall back to their defaults.

use std::env;
use std::time::Duration;

use crate::classifier::gemini::{DEFAULT_MODEL, GEMINI_API_BASE};
use crate::storage::DEFAULT_HISTORY_RETENTION;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_PATH: &str = "sqlite:toxiscope.db?mode=rwc";

/// Default bound on one classification request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub database_url: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub request_timeout: Duration,
    pub relay_url: Option<String>,
    pub history_retention: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_PATH.to_string(),
            gemini_base_url: GEMINI_API_BASE.to_string(),
            gemini_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            relay_url: None,
            history_retention: DEFAULT_HISTORY_RETENTION,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: non_empty("TOXISCOPE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: non_empty("TOXISCOPE_DATABASE_URL").unwrap_or(defaults.database_url),
            gemini_base_url: non_empty("TOXISCOPE_GEMINI_BASE_URL")
                .unwrap_or(defaults.gemini_base_url),
            gemini_model: non_empty("TOXISCOPE_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            request_timeout: non_empty("TOXISCOPE_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            relay_url: non_empty("TOXISCOPE_RELAY_URL"),
            history_retention: non_empty("TOXISCOPE_HISTORY_RETENTION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_retention),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(config_from(&[]), ServiceConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TOXISCOPE_PORT", "8080"),
            ("TOXISCOPE_GEMINI_MODEL", "gemini-1.5-pro"),
            ("TOXISCOPE_REQUEST_TIMEOUT_SECS", "5"),
            ("TOXISCOPE_RELAY_URL", "ws://localhost:8765"),
            ("TOXISCOPE_HISTORY_RETENTION", "50"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.relay_url.as_deref(), Some("ws://localhost:8765"));
        assert_eq!(config.database_url, DEFAULT_DB_PATH);
        assert_eq!(config.history_retention, 50);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("TOXISCOPE_PORT", "not-a-port"),
            ("TOXISCOPE_REQUEST_TIMEOUT_SECS", "-1"),
            ("TOXISCOPE_RELAY_URL", "  "),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.relay_url.is_none());
    }
}
