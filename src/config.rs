//! Platform configuration

use crate::discovery::DEFAULT_SEARCH_TARGET;
use crate::error::{NaimError, Result};
use crate::protocol::DEFAULT_API_PORT;
use serde::Deserialize;
use std::time::Duration;

/// Platform block handed over by the host, e.g.
///
/// ```json
/// { "platform": "NaimAudioPlatform", "name": "Naim Audio", "discoveryTimeoutMs": 10000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// How long one discovery window stays open
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    #[serde(default = "default_search_target")]
    pub search_target: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Timeout of every control API and descriptor request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Substring the manufacturer field must contain
    #[serde(default = "default_brand_marker")]
    pub brand_marker: String,
}

fn default_name() -> String {
    "Naim Audio".to_string()
}

fn default_discovery_timeout_ms() -> u64 {
    10_000
}

fn default_search_target() -> String {
    DEFAULT_SEARCH_TARGET.to_string()
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_brand_marker() -> String {
    "Naim".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            search_target: default_search_target(),
            api_port: default_api_port(),
            request_timeout_ms: default_request_timeout_ms(),
            brand_marker: default_brand_marker(),
        }
    }
}

impl PlatformConfig {
    /// Parse and validate the host's JSON platform block
    ///
    /// # Errors
    ///
    /// Returns `NaimError::Json` on a malformed block and
    /// `NaimError::InvalidConfig` on unusable values.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery_timeout_ms == 0 {
            return Err(NaimError::InvalidConfig("discoveryTimeoutMs must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(NaimError::InvalidConfig("requestTimeoutMs must be positive".into()));
        }
        if self.api_port == 0 {
            return Err(NaimError::InvalidConfig("apiPort must be positive".into()));
        }
        Ok(())
    }

    pub fn discovery_window(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PlatformConfig::from_value(json!({ "platform": "NaimAudioPlatform" })).unwrap();
        assert_eq!(config, PlatformConfig::default());
        assert_eq!(config.discovery_window(), Duration::from_secs(10));
        assert_eq!(config.api_port, 15081);
        assert_eq!(config.search_target, "urn:schemas-upnp-org:device:MediaRenderer:2");
    }

    #[test]
    fn test_camel_case_overrides() {
        let config = PlatformConfig::from_value(json!({
            "name": "Living Room",
            "discoveryTimeoutMs": 3000,
            "apiPort": 8080,
            "requestTimeoutMs": 1500,
        }))
        .unwrap();
        assert_eq!(config.name, "Living Room");
        assert_eq!(config.discovery_window(), Duration::from_secs(3));
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.brand_marker, "Naim");
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = PlatformConfig::from_value(json!({ "discoveryTimeoutMs": 0 })).unwrap_err();
        assert!(matches!(err, NaimError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_block_is_json_error() {
        let err = PlatformConfig::from_value(json!({ "apiPort": "loud" })).unwrap_err();
        assert!(matches!(err, NaimError::Json(_)));
    }
}
