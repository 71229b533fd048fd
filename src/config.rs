//! Engine configuration.

use crate::error::EngineError;

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Shortest poll interval accepted; smaller values are raised to this.
pub const MIN_POLL_INTERVAL_MS: u64 = 50;

/// Connection settings for one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// IP address of the controller. Empty means not configured.
    #[serde(default, alias = "host")]
    pub target_address: String,
    /// Control port of the controller.
    #[serde(default = "default_port", alias = "port")]
    pub target_port: u16,
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_port() -> u16 {
    8001
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_address: String::new(),
            target_port: default_port(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl EngineConfig {
    /// Configuration for `address` with default port and interval.
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            target_address: address.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate the target and return it as a socket address pair.
    ///
    /// # Errors
    /// - [`EngineError::MissingAddress`] if no address is set
    /// - [`EngineError::InvalidAddress`] if it is not an IP address
    /// - [`EngineError::InvalidPort`] if the port is 0
    pub fn target(&self) -> Result<(IpAddr, u16), EngineError> {
        let address = self.target_address.trim();
        if address.is_empty() {
            return Err(EngineError::MissingAddress);
        }
        let ip = address
            .parse::<IpAddr>()
            .map_err(|_| EngineError::InvalidAddress(address.to_string()))?;
        if self.target_port == 0 {
            return Err(EngineError::InvalidPort(self.target_port));
        }
        Ok((ip, self.target_port))
    }

    /// Poll interval, never below [`MIN_POLL_INTERVAL_MS`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}
