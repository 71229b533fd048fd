//! Error types for the synchronization engine.

use crate::store::Resource;

/// Errors reported by a [`DeviceClient`](crate::DeviceClient) or
/// [`DeviceConnector`](crate::DeviceConnector).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    /// The device could not be reached.
    #[error("Connection to {address} failed: {reason}")]
    Unreachable {
        /// Address that was dialled.
        address: String,
        /// Transport-level reason.
        reason: String,
    },

    /// The request did not complete in time.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The device answered but refused the request.
    #[error("Device rejected request (code: {0})")]
    Rejected(i64),

    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The client was used after it was released.
    #[error("Client already closed")]
    Closed,
}

impl From<serde_json::Error> for DeviceError {
    fn from(err: serde_json::Error) -> Self {
        DeviceError::Malformed(err.to_string())
    }
}

/// Error returned by a [`ControlSurface`](crate::ControlSurface) sink.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Control surface rejected update: {0}")]
pub struct SurfaceError(pub String);

/// Errors surfaced by the [`Engine`](crate::Engine).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No target address was configured.
    #[error("Target address is not configured")]
    MissingAddress,

    /// The target address is not a valid IP address.
    #[error("Invalid target address '{0}'")]
    InvalidAddress(String),

    /// The port is outside the usable range.
    #[error("Invalid target port {0}")]
    InvalidPort(u16),

    /// Constructing the device client failed.
    #[error("Failed to connect: {0}")]
    Connect(#[source] DeviceError),

    /// A mandatory bootstrap fetch failed.
    #[error("Bootstrap fetch of {resource} failed: {source}")]
    Bootstrap {
        /// The resource being fetched.
        resource: Resource,
        /// The underlying device error.
        #[source]
        source: DeviceError,
    },

    /// An action was requested while no device client is live.
    #[error("Engine is not connected")]
    NotConnected,

    /// A control value was outside the valid range.
    #[error("Invalid value {value} for {setting} (expected {min}-{max})")]
    InvalidSetting {
        /// The setting name.
        setting: &'static str,
        /// The invalid value provided.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// The device rejected or failed an action.
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// A configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// The file being read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
