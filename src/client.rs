//! Device client contract.
//!
//! The wire protocol lives outside this crate. Anything that can answer the
//! calls below can be driven by the [`Engine`](crate::Engine).

use crate::error::DeviceError;
use crate::model::{Ack, DisplayParameterSet, DisplayStateRecord, RawPresets, Setting, Source};

use std::future::Future;
use std::net::IpAddr;

// =============================================================================
// Device Client Trait
// =============================================================================

/// Request/response calls against one controller.
///
/// Every call either returns a value or fails with a [`DeviceError`]; callers
/// never see partial responses.
pub trait DeviceClient: Send + Sync + 'static {
    /// List the input sources.
    fn list_sources(&self) -> impl Future<Output = Result<Vec<Source>, DeviceError>> + Send;

    /// Fetch the stored presets in whatever shape the firmware uses.
    fn list_presets(&self) -> impl Future<Output = Result<RawPresets, DeviceError>> + Send;

    /// Fetch brightness, color temperature and gamma for every screen.
    fn get_display_parameters(
        &self,
    ) -> impl Future<Output = Result<DisplayParameterSet, DeviceError>> + Send;

    /// Fetch the output mode of every screen.
    fn get_display_state(
        &self,
    ) -> impl Future<Output = Result<DisplayStateRecord, DeviceError>> + Send;

    /// Apply a control action.
    fn apply_setting(
        &self,
        setting: &Setting,
    ) -> impl Future<Output = Result<Ack, DeviceError>> + Send;

    /// Release the connection.
    fn close(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

/// Builds a [`DeviceClient`] for a target address.
pub trait DeviceConnector: Send + Sync {
    /// The client type produced.
    type Client: DeviceClient;

    /// Construct a client for `address:port`.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] if the client cannot be constructed.
    fn connect(&self, address: IpAddr, port: u16) -> Result<Self::Client, DeviceError>;
}
