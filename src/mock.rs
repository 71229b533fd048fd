//! Mock device and control surface for testing.

use crate::client::{DeviceClient, DeviceConnector};
use crate::derived::{Choice, ChoiceKind, VariableDefinition, VariableValues};
use crate::error::{DeviceError, SurfaceError};
use crate::model::{
    Ack, DisplayParameterSet, DisplayStateRecord, RawPresets, ScreenMode, Setting, SettingKind,
    Source,
};
use crate::store::Resource;
use crate::surface::{ConnectionStatus, ControlSurface};

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// =============================================================================
// Mock Device
// =============================================================================

struct MockState {
    sources: Result<Vec<Source>, DeviceError>,
    presets: Result<RawPresets, DeviceError>,
    display_parameters: Result<DisplayParameterSet, DeviceError>,
    display_state: Result<DisplayStateRecord, DeviceError>,
    latency: Duration,
    calls: HashMap<Resource, usize>,
    applied: Vec<Setting>,
    reject_settings: bool,
    fail_close: bool,
    closed: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            sources: Ok(Vec::new()),
            presets: Ok(RawPresets::Flat(Vec::new())),
            display_parameters: Ok(Vec::new()),
            display_state: Ok(DisplayStateRecord::default()),
            latency: Duration::ZERO,
            calls: HashMap::new(),
            applied: Vec::new(),
            reject_settings: false,
            fail_close: false,
            closed: false,
        }
    }
}

/// A scriptable in-memory controller.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// the client produced by [`MockConnector`].
///
/// # Example
///
/// ```
/// use coex_sync::{DeviceClient, MockDevice, Source};
///
/// let device = MockDevice::new();
/// device.set_sources(vec![Source::new("HDMI1")]);
///
/// let rt = tokio::runtime::Builder::new_current_thread()
///     .enable_time()
///     .build()
///     .unwrap();
/// let sources = rt.block_on(device.list_sources()).unwrap();
/// assert_eq!(sources[0].name, "HDMI1");
/// ```
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create a device with empty responses.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Respond to `list_sources` with these sources.
    pub fn set_sources(&self, sources: Vec<Source>) {
        self.lock().sources = Ok(sources);
    }

    /// Respond to `list_presets` with this payload.
    pub fn set_presets(&self, presets: RawPresets) {
        self.lock().presets = Ok(presets);
    }

    /// Respond to `get_display_parameters` with these parameters.
    pub fn set_display_parameters(&self, params: DisplayParameterSet) {
        self.lock().display_parameters = Ok(params);
    }

    /// Respond to `get_display_state` with this record.
    pub fn set_display_state(&self, state: DisplayStateRecord) {
        self.lock().display_state = Ok(state);
    }

    /// Make fetches of `resource` fail with `error` until a value is set again.
    pub fn fail(&self, resource: Resource, error: DeviceError) {
        let mut state = self.lock();
        match resource {
            Resource::Sources => state.sources = Err(error),
            Resource::Presets => state.presets = Err(error),
            Resource::DisplayParameters => state.display_parameters = Err(error),
            Resource::DisplayState => state.display_state = Err(error),
        }
    }

    /// Delay every fetch by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Reject every `apply_setting` call.
    pub fn reject_settings(&self, reject: bool) {
        self.lock().reject_settings = reject;
    }

    /// Make `close` fail.
    pub fn fail_close(&self, fail: bool) {
        self.lock().fail_close = fail;
    }

    /// Number of fetches of `resource` so far.
    pub fn call_count(&self, resource: Resource) -> usize {
        self.lock().calls.get(&resource).copied().unwrap_or(0)
    }

    /// Number of fetches of any resource so far.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Settings applied so far.
    pub fn applied_settings(&self) -> Vec<Setting> {
        self.lock().applied.clone()
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    async fn respond<T>(
        &self,
        resource: Resource,
        read: impl FnOnce(&MockState) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let (latency, result) = {
            let mut state = self.lock();
            *state.calls.entry(resource).or_insert(0) += 1;
            let result = if state.closed {
                Err(DeviceError::Closed)
            } else {
                read(&*state)
            };
            (state.latency, result)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }

    fn record(&self, setting: &Setting) -> Result<Ack, DeviceError> {
        let mut state = self.lock();
        if state.closed {
            return Err(DeviceError::Closed);
        }
        if state.reject_settings {
            return Err(DeviceError::Rejected(-1));
        }
        state.applied.push(setting.clone());

        let target = setting.target.as_deref();
        let targets = |screen_id: &str| target.is_none_or(|t| t == screen_id);
        match &setting.kind {
            SettingKind::Brightness(fraction) => {
                if let Ok(params) = &mut state.display_parameters {
                    params
                        .iter_mut()
                        .filter(|screen| targets(&screen.screen_id))
                        .for_each(|screen| screen.brightness = *fraction);
                }
            }
            SettingKind::Gamma(gamma) => {
                if let Ok(params) = &mut state.display_parameters {
                    params
                        .iter_mut()
                        .filter(|screen| targets(&screen.screen_id))
                        .for_each(|screen| screen.gamma = *gamma);
                }
            }
            SettingKind::ColorTemperature(kelvin) => {
                if let Ok(params) = &mut state.display_parameters {
                    params
                        .iter_mut()
                        .filter(|screen| targets(&screen.screen_id))
                        .for_each(|screen| screen.color_temperature = *kelvin);
                }
            }
            SettingKind::DisplayMode(mode) => {
                if let Ok(display) = &mut state.display_state {
                    display
                        .screens
                        .iter_mut()
                        .filter(|screen: &&mut ScreenMode| {
                            screen.screen_id.as_deref().is_none_or(|id| targets(id))
                        })
                        .for_each(|screen| screen.mode_code = mode.code());
                }
            }
            SettingKind::LoadPreset(name) => {
                if let Ok(RawPresets::Flat(presets)) = &mut state.presets {
                    for preset in presets.iter_mut() {
                        preset.active = preset.name == *name;
                    }
                }
            }
            SettingKind::TestPattern(_) | SettingKind::SwitchSource(_) => {}
        }
        Ok(Ack { code: 0 })
    }
}

impl DeviceClient for MockDevice {
    async fn list_sources(&self) -> Result<Vec<Source>, DeviceError> {
        self.respond(Resource::Sources, |s| s.sources.clone()).await
    }

    async fn list_presets(&self) -> Result<RawPresets, DeviceError> {
        self.respond(Resource::Presets, |s| s.presets.clone()).await
    }

    async fn get_display_parameters(&self) -> Result<DisplayParameterSet, DeviceError> {
        self.respond(Resource::DisplayParameters, |s| {
            s.display_parameters.clone()
        })
        .await
    }

    async fn get_display_state(&self) -> Result<DisplayStateRecord, DeviceError> {
        self.respond(Resource::DisplayState, |s| s.display_state.clone())
            .await
    }

    async fn apply_setting(&self, setting: &Setting) -> Result<Ack, DeviceError> {
        self.record(setting)
    }

    async fn close(&self) -> Result<(), DeviceError> {
        let mut state = self.lock();
        state.closed = true;
        if state.fail_close {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }
}

/// Hands out clones of one [`MockDevice`].
pub struct MockConnector {
    device: MockDevice,
    fail_with: Mutex<Option<DeviceError>>,
    connects: AtomicUsize,
    last_target: Mutex<Option<(IpAddr, u16)>>,
}

impl MockConnector {
    /// Create a connector for `device`.
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            fail_with: Mutex::new(None),
            connects: AtomicUsize::new(0),
            last_target: Mutex::new(None),
        }
    }

    /// Make subsequent `connect` calls fail with `error`, or succeed again
    /// with `None`.
    pub fn fail_with(&self, error: Option<DeviceError>) {
        *self.fail_with.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Address and port of the last `connect` call.
    pub fn last_target(&self) -> Option<(IpAddr, u16)> {
        *self.last_target.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceConnector for MockConnector {
    type Client = MockDevice;

    fn connect(&self, address: IpAddr, port: u16) -> Result<MockDevice, DeviceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_target.lock().unwrap_or_else(PoisonError::into_inner) = Some((address, port));
        if let Some(error) = self
            .fail_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        self.device.lock().closed = false;
        Ok(self.device.clone())
    }
}

// =============================================================================
// Recording Surface
// =============================================================================

/// One call received by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    /// `publish_choice_list` with the choice ids.
    Choices(ChoiceKind, Vec<String>),
    /// `publish_variable_definitions` with the variable ids.
    Definitions(Vec<String>),
    /// `publish_variable_values`.
    Values(VariableValues),
    /// `refresh_feedback_visuals`.
    RefreshFeedbacks,
}

/// A [`ControlSurface`] that records everything it is sent.
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    statuses: Mutex<Vec<ConnectionStatus>>,
    fail_values: AtomicBool,
}

impl RecordingSurface {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: SurfaceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Make `publish_variable_values` fail.
    pub fn fail_values(&self, fail: bool) {
        self.fail_values.store(fail, Ordering::SeqCst);
    }

    /// Every publish call so far, in order.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget recorded calls and statuses.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Every status reported so far, in order.
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent status.
    pub fn last_status(&self) -> Option<ConnectionStatus> {
        self.statuses().last().copied()
    }

    /// Number of value publishes.
    pub fn value_publish_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::Values(_)))
            .count()
    }

    /// Number of definition publishes.
    pub fn definition_publish_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::Definitions(_)))
            .count()
    }

    /// Number of choice-list publishes for `kind`.
    pub fn choice_publish_count(&self, kind: ChoiceKind) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::Choices(k, _) if *k == kind))
            .count()
    }

    /// Number of feedback refreshes.
    pub fn feedback_refresh_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::RefreshFeedbacks))
            .count()
    }

    /// The last published choice ids for `kind`.
    pub fn latest_choices(&self, kind: ChoiceKind) -> Option<Vec<String>> {
        self.calls().into_iter().rev().find_map(|call| match call {
            SurfaceCall::Choices(k, ids) if k == kind => Some(ids),
            _ => None,
        })
    }

    /// The last published variable values, empty if none.
    pub fn latest_values(&self) -> VariableValues {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                SurfaceCall::Values(values) => Some(values),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl ControlSurface for RecordingSurface {
    fn set_status(&self, status: ConnectionStatus, _message: Option<&str>) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status);
    }

    fn publish_choice_list(
        &self,
        kind: ChoiceKind,
        choices: &[Choice],
    ) -> Result<(), SurfaceError> {
        self.push(SurfaceCall::Choices(
            kind,
            choices.iter().map(|choice| choice.id.clone()).collect(),
        ));
        Ok(())
    }

    fn publish_variable_definitions(
        &self,
        definitions: &[VariableDefinition],
    ) -> Result<(), SurfaceError> {
        self.push(SurfaceCall::Definitions(
            definitions.iter().map(|d| d.id.clone()).collect(),
        ));
        Ok(())
    }

    fn publish_variable_values(&self, values: &VariableValues) -> Result<(), SurfaceError> {
        if self.fail_values.load(Ordering::SeqCst) {
            return Err(SurfaceError("values sink unavailable".into()));
        }
        self.push(SurfaceCall::Values(values.clone()));
        Ok(())
    }

    fn refresh_feedback_visuals(&self) -> Result<(), SurfaceError> {
        self.push(SurfaceCall::RefreshFeedbacks);
        Ok(())
    }
}
