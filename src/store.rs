//! Last-known device state and change detection.

use crate::derived::{self, Choice};
use crate::error::DeviceError;
use crate::model::{
    DisplayParameterSet, DisplayStateRecord, PresetRecord, RawPresets, ScreenParameters, Source,
};

use log::{trace, warn};
use std::fmt;

/// The device-state categories refreshed every poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Input sources.
    Sources,
    /// Stored presets.
    Presets,
    /// Per-screen brightness, color temperature and gamma.
    DisplayParameters,
    /// Per-screen output mode.
    DisplayState,
}

impl Resource {
    /// Every resource, in poll order.
    pub const ALL: [Resource; 4] = [
        Resource::Sources,
        Resource::Presets,
        Resource::DisplayParameters,
        Resource::DisplayState,
    ];
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Sources => "sources",
            Resource::Presets => "presets",
            Resource::DisplayParameters => "display parameters",
            Resource::DisplayState => "display state",
        })
    }
}

/// A freshly fetched value, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Result of `list_sources`.
    Sources(Vec<Source>),
    /// Result of `list_presets`.
    Presets(RawPresets),
    /// Result of `get_display_parameters`.
    DisplayParameters(DisplayParameterSet),
    /// Result of `get_display_state`.
    DisplayState(DisplayStateRecord),
}

impl Fetched {
    /// The resource this value belongs to.
    pub fn resource(&self) -> Resource {
        match self {
            Fetched::Sources(_) => Resource::Sources,
            Fetched::Presets(_) => Resource::Presets,
            Fetched::DisplayParameters(_) => Resource::DisplayParameters,
            Fetched::DisplayState(_) => Resource::DisplayState,
        }
    }
}

/// Result of feeding a fetch into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The value differed and was stored.
    Changed,
    /// The value equals the stored one; nothing was written.
    Unchanged,
    /// The fetch failed; the stored value was kept.
    FetchFailed,
}

/// Values derived from the tracked resources.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    /// Name of the active preset or [`NOT_ACTIVATED`](derived::NOT_ACTIVATED).
    pub active_preset_name: String,
    /// Choices built from the sources.
    pub source_choices: Vec<Choice>,
    /// Choices built from the presets.
    pub preset_choices: Vec<Choice>,
    /// Choices built from the display parameters.
    pub screen_choices: Vec<Choice>,
    /// Number of screens the published variable definitions cover.
    pub screen_count: usize,
}

impl Default for DerivedState {
    fn default() -> Self {
        Self {
            active_preset_name: derived::NOT_ACTIVATED.to_string(),
            source_choices: Vec::new(),
            preset_choices: Vec::new(),
            screen_choices: Vec::new(),
            screen_count: 0,
        }
    }
}

/// A point-in-time copy of the store for status queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Last-known sources.
    pub sources: Option<Vec<Source>>,
    /// Last-known presets in canonical form.
    pub presets: Option<Vec<PresetRecord>>,
    /// Last-known display parameters.
    pub display_parameters: Option<DisplayParameterSet>,
    /// Last-known display state.
    pub display_state: Option<DisplayStateRecord>,
    /// Derived fields.
    pub derived: DerivedState,
}

/// Holds the last-known value of every [`Resource`].
///
/// `None` means the resource has not been fetched yet (or was reset). Values
/// are only ever replaced whole.
#[derive(Debug, Default)]
pub struct StateStore {
    sources: Option<Vec<Source>>,
    presets: Option<Vec<PresetRecord>>,
    display_parameters: Option<DisplayParameterSet>,
    display_state: Option<DisplayStateRecord>,
    derived: DerivedState,
}

fn replace_if_changed<T: PartialEq>(slot: &mut Option<T>, value: T) -> ApplyOutcome {
    if slot.as_ref() == Some(&value) {
        ApplyOutcome::Unchanged
    } else {
        *slot = Some(value);
        ApplyOutcome::Changed
    }
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a fetch result for `resource` into the store.
    ///
    /// Presets are normalized before comparison. A value is stored only when
    /// it differs structurally from the current one.
    pub fn apply(
        &mut self,
        resource: Resource,
        fetched: Result<Fetched, DeviceError>,
    ) -> ApplyOutcome {
        let fetched = match fetched {
            Ok(fetched) if fetched.resource() == resource => fetched,
            Ok(fetched) => {
                warn!(
                    "failed to poll {}: got a {} payload instead",
                    resource,
                    fetched.resource()
                );
                return ApplyOutcome::FetchFailed;
            }
            Err(e) => {
                warn!("failed to poll {}: {}", resource, e);
                return ApplyOutcome::FetchFailed;
            }
        };

        let outcome = match fetched {
            Fetched::Sources(sources) => replace_if_changed(&mut self.sources, sources),
            Fetched::Presets(raw) => replace_if_changed(&mut self.presets, raw.normalize()),
            Fetched::DisplayParameters(params) => {
                replace_if_changed(&mut self.display_parameters, params)
            }
            Fetched::DisplayState(state) => replace_if_changed(&mut self.display_state, state),
        };
        trace!("{} poll: {:?}", resource, outcome);
        outcome
    }

    /// Drop every stored value and derived field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Last-known sources.
    pub fn sources(&self) -> &[Source] {
        self.sources.as_deref().unwrap_or_default()
    }

    /// Last-known presets.
    pub fn presets(&self) -> &[PresetRecord] {
        self.presets.as_deref().unwrap_or_default()
    }

    /// Last-known display parameters.
    pub fn display_parameters(&self) -> &[ScreenParameters] {
        self.display_parameters.as_deref().unwrap_or_default()
    }

    /// Last-known display state, if fetched.
    pub fn display_state(&self) -> Option<&DisplayStateRecord> {
        self.display_state.as_ref()
    }

    /// Whether `resource` currently holds a value.
    pub fn has(&self, resource: Resource) -> bool {
        match resource {
            Resource::Sources => self.sources.is_some(),
            Resource::Presets => self.presets.is_some(),
            Resource::DisplayParameters => self.display_parameters.is_some(),
            Resource::DisplayState => self.display_state.is_some(),
        }
    }

    /// Derived fields.
    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    /// Mutable access to derived fields, for the dispatcher.
    pub(crate) fn derived_mut(&mut self) -> &mut DerivedState {
        &mut self.derived
    }

    /// Clone the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            sources: self.sources.clone(),
            presets: self.presets.clone(),
            display_parameters: self.display_parameters.clone(),
            display_state: self.display_state.clone(),
            derived: self.derived.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(id: &str, brightness: f64) -> ScreenParameters {
        ScreenParameters {
            screen_id: id.to_string(),
            brightness,
            color_temperature: 6500,
            gamma: 2.2,
        }
    }

    #[test]
    fn test_same_value_twice_changes_once() {
        let mut store = StateStore::new();
        let value = || Ok(Fetched::DisplayParameters(vec![screen("A", 0.5)]));

        assert_eq!(store.apply(Resource::DisplayParameters, value()), ApplyOutcome::Changed);
        assert_eq!(store.apply(Resource::DisplayParameters, value()), ApplyOutcome::Unchanged);
        assert_eq!(store.display_parameters(), &[screen("A", 0.5)]);
    }

    #[test]
    fn test_different_value_replaces_stored_one() {
        let mut store = StateStore::new();
        store.apply(
            Resource::DisplayParameters,
            Ok(Fetched::DisplayParameters(vec![screen("A", 0.5)])),
        );
        let outcome = store.apply(
            Resource::DisplayParameters,
            Ok(Fetched::DisplayParameters(vec![screen("A", 0.8)])),
        );
        assert_eq!(outcome, ApplyOutcome::Changed);
        assert_eq!(store.display_parameters()[0].brightness, 0.8);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_value() {
        let mut store = StateStore::new();
        store.apply(
            Resource::Sources,
            Ok(Fetched::Sources(vec![Source::new("HDMI1")])),
        );
        let outcome = store.apply(Resource::Sources, Err(DeviceError::Timeout(500)));
        assert_eq!(outcome, ApplyOutcome::FetchFailed);
        assert_eq!(store.sources(), &[Source::new("HDMI1")]);
    }

    #[test]
    fn test_mismatched_payload_is_a_failed_fetch() {
        let mut store = StateStore::new();
        let outcome = store.apply(
            Resource::Presets,
            Ok(Fetched::Sources(vec![Source::new("SDI")])),
        );
        assert_eq!(outcome, ApplyOutcome::FetchFailed);
        assert!(!store.has(Resource::Presets));
        assert!(!store.has(Resource::Sources));
    }

    #[test]
    fn test_presets_compare_after_normalization() {
        let mut store = StateStore::new();
        let record = PresetRecord::new("Show", 1, true);
        store.apply(
            Resource::Presets,
            Ok(Fetched::Presets(RawPresets::Flat(vec![record.clone()]))),
        );
        let nested = RawPresets::PerScreen(vec![crate::model::ScreenPresets {
            screen_id: Some("A".into()),
            presets: vec![record],
        }]);
        assert_eq!(
            store.apply(Resource::Presets, Ok(Fetched::Presets(nested))),
            ApplyOutcome::Unchanged
        );
    }

    #[test]
    fn test_empty_value_is_a_change_from_absent() {
        let mut store = StateStore::new();
        assert_eq!(
            store.apply(Resource::Sources, Ok(Fetched::Sources(vec![]))),
            ApplyOutcome::Changed
        );
        assert!(store.has(Resource::Sources));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = StateStore::new();
        store.apply(
            Resource::DisplayState,
            Ok(Fetched::DisplayState(DisplayStateRecord::from_codes(&[1]))),
        );
        store.derived_mut().active_preset_name = "Show".into();
        store.reset();
        for resource in Resource::ALL {
            assert!(!store.has(resource));
        }
        assert_eq!(store.derived(), &DerivedState::default());
    }
}
