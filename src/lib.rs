//! State synchronization engine for networked LED display controllers.
//!
//! The engine connects to one controller, fetches the data a control surface
//! needs (input sources, presets), then polls the controller on a fixed
//! interval. Each poll result goes through a change detector; only real
//! changes cause derived values (dropdown entries, variables, the active
//! preset name) to be recomputed and published to the surface.
//!
//! The wire protocol and the surface rendering are pluggable through the
//! [`DeviceConnector`], [`DeviceClient`] and [`ControlSurface`] traits.
//!
//! # Example
//!
//! ```no_run
//! use coex_sync::{Engine, EngineConfig, MockConnector, MockDevice, RecordingSurface, Setting};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), coex_sync::EngineError> {
//!     let device = MockDevice::new();
//!     let surface = Arc::new(RecordingSurface::new());
//!     let mut engine = Engine::new(MockConnector::new(device), surface.clone());
//!
//!     // Connect, bootstrap and start polling
//!     engine.configure(EngineConfig::for_address("192.168.0.10")).await?;
//!
//!     // Drive the device; the next poll publishes the change
//!     engine.apply_setting(&Setting::brightness(75)?).await?;
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! [`MockDevice`] and [`RecordingSurface`] stand in for real hardware and a
//! real surface:
//!
//! ```
//! use coex_sync::{derived, RecordingSurface, Reconciler, Fetched, Resource, Source};
//! use std::sync::Arc;
//!
//! let surface = Arc::new(RecordingSurface::new());
//! let reconciler = Reconciler::new(surface.clone());
//! reconciler.apply(Resource::Sources, Ok(Fetched::Sources(vec![Source::new("HDMI1")])));
//! assert_eq!(
//!     surface.latest_choices(derived::ChoiceKind::Sources),
//!     Some(vec!["HDMI1".to_string()])
//! );
//! ```

#![warn(missing_docs)]

mod client;
mod config;
pub mod derived;
mod dispatch;
mod engine;
mod error;
mod mock;
mod model;
mod scheduler;
mod store;
mod surface;

// Re-export public API
pub use client::{DeviceClient, DeviceConnector};
pub use config::{EngineConfig, MIN_POLL_INTERVAL_MS};
pub use dispatch::{FetchSink, Reconciler};
pub use engine::{Engine, FailureKind, LifecycleState};
pub use error::{DeviceError, EngineError, SurfaceError};
pub use mock::{MockConnector, MockDevice, RecordingSurface, SurfaceCall};
pub use model::{
    Ack, BRIGHTNESS_RANGE, COLOR_TEMPERATURE_RANGE, DisplayMode, DisplayParameterSet,
    DisplayStateRecord, GAMMA_RANGE, MAX_TEST_PATTERN, PresetRecord, RawPresets, ScreenMode,
    ScreenParameters, ScreenPresets, Setting, SettingKind, Source,
};
pub use scheduler::{FetchFuture, PollScheduler, PollTarget};
pub use store::{ApplyOutcome, DerivedState, Fetched, Resource, StateStore, StoreSnapshot};
pub use surface::{ConnectionStatus, ControlSurface};
