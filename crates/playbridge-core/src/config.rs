//! Bridge configuration

use crate::{types::SessionId, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// User agent sent by networked data access
    pub user_agent: String,
    /// Connect timeout for networked sources (milliseconds)
    pub connect_timeout_ms: u64,
    /// Read timeout for networked sources (milliseconds)
    pub read_timeout_ms: u64,
    /// Follow redirects that switch between http and https
    pub allow_cross_protocol_redirects: bool,
    /// Maximum redirect hops
    pub max_redirects: usize,
    /// Let progressive extractors start on non-IDR keyframes
    pub allow_non_idr_keyframes: bool,
    /// Root directory bundled assets are looked up under
    pub asset_root: String,
    /// Prefix of the per-session event stream name
    pub event_channel_prefix: String,
    /// Volume applied when `create` does not specify one
    pub default_volume: f64,
    /// Looping applied when `create` does not specify it
    pub default_looping: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            user_agent: "playbridge".to_string(),
            connect_timeout_ms: 8_000,
            read_timeout_ms: 8_000,
            allow_cross_protocol_redirects: true,
            max_redirects: 20,
            allow_non_idr_keyframes: false,
            asset_root: "assets".to_string(),
            event_channel_prefix: "playbridge/videoEvents".to_string(),
            default_volume: 1.0,
            default_looping: false,
        }
    }
}

impl BridgeConfig {
    /// Parse from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::InvalidConfig(format!(
                "default volume {} outside [0, 1]",
                self.default_volume
            )));
        }
        if self.user_agent.is_empty() {
            return Err(Error::InvalidConfig("user agent must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Name of the event stream belonging to a session
    pub fn event_channel_name(&self, id: SessionId) -> String {
        format!("{}{}", self.event_channel_prefix, id)
    }
}
