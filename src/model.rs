//! Device data model.
//!
//! These types mirror the JSON payloads returned by the controller and are
//! also the canonical in-memory shapes the [`StateStore`](crate::StateStore)
//! compares and stores.

use crate::error::EngineError;
use log::debug;
use serde::{Deserialize, Serialize};

// =============================================================================
// Sources
// =============================================================================

/// An input source known to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Source name, also used as its identifier.
    pub name: String,
}

impl Source {
    /// Create a source with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// =============================================================================
// Presets
// =============================================================================

/// A stored preset in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetRecord {
    /// Preset name.
    pub name: String,
    /// Position of the preset on the device.
    #[serde(default)]
    pub sequence_number: u32,
    /// Whether the preset is currently loaded.
    #[serde(default, rename = "state")]
    pub active: bool,
}

impl PresetRecord {
    /// Create a preset record.
    pub fn new(name: impl Into<String>, sequence_number: u32, active: bool) -> Self {
        Self {
            name: name.into(),
            sequence_number,
            active,
        }
    }
}

/// Presets for one screen in the nested wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenPresets {
    /// Screen the presets belong to.
    #[serde(default)]
    pub screen_id: Option<String>,
    /// Presets stored for that screen.
    pub presets: Vec<PresetRecord>,
}

/// Raw preset payload as returned by the device.
///
/// Firmware versions disagree on the shape, so every accepted variant is
/// listed here and [`RawPresets::normalize`] maps it to the canonical list.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPresets {
    /// A flat list of presets.
    Flat(Vec<PresetRecord>),
    /// One preset list per screen.
    PerScreen(Vec<ScreenPresets>),
    /// Anything else (null, an object, a list of junk).
    Unrecognized(serde_json::Value),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PresetWireShape {
    PerScreen(Vec<ScreenPresets>),
    Flat(Vec<PresetRecord>),
}

impl RawPresets {
    /// Classify a JSON payload into one of the accepted shapes.
    pub fn from_json(value: serde_json::Value) -> Self {
        match serde_json::from_value::<PresetWireShape>(value.clone()) {
            Ok(PresetWireShape::PerScreen(screens)) => RawPresets::PerScreen(screens),
            Ok(PresetWireShape::Flat(presets)) => RawPresets::Flat(presets),
            Err(_) => RawPresets::Unrecognized(value),
        }
    }

    /// Map the payload to the canonical preset sequence.
    ///
    /// The nested shape only contributes the first screen's list; other
    /// screens are ignored. Unrecognized payloads yield an empty set.
    pub fn normalize(&self) -> Vec<PresetRecord> {
        match self {
            RawPresets::Flat(presets) => presets.clone(),
            RawPresets::PerScreen(screens) => screens
                .first()
                .map(|screen| screen.presets.clone())
                .unwrap_or_default(),
            RawPresets::Unrecognized(value) => {
                debug!("unrecognized preset payload, treating as empty: {}", value);
                Vec::new()
            }
        }
    }
}

// =============================================================================
// Display parameters
// =============================================================================

/// Output parameters of one screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenParameters {
    /// Device identifier of the screen.
    pub screen_id: String,
    /// Brightness as a fraction in `[0, 1]`.
    #[serde(default)]
    pub brightness: f64,
    /// Color temperature in Kelvin.
    #[serde(default)]
    pub color_temperature: u32,
    /// Gamma value.
    #[serde(default)]
    pub gamma: f64,
}

impl ScreenParameters {
    /// Brightness rounded to a whole percentage.
    pub fn brightness_percent(&self) -> u8 {
        (self.brightness.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Parameters for every screen, in device order.
pub type DisplayParameterSet = Vec<ScreenParameters>;

// =============================================================================
// Display state
// =============================================================================

/// Output mode of a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Content is shown normally.
    Normal,
    /// Output is black.
    Blackout,
    /// Output is frozen on the last frame.
    Freeze,
}

impl DisplayMode {
    /// Decode the device's integer encoding.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(DisplayMode::Normal),
            1 => Some(DisplayMode::Blackout),
            2 => Some(DisplayMode::Freeze),
            _ => None,
        }
    }

    /// The device's integer encoding.
    pub fn code(self) -> i64 {
        match self {
            DisplayMode::Normal => 0,
            DisplayMode::Blackout => 1,
            DisplayMode::Freeze => 2,
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Normal => "Normal",
            DisplayMode::Blackout => "Blackout",
            DisplayMode::Freeze => "Freeze",
        }
    }
}

/// Mode reported for a single screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenMode {
    /// Device identifier of the screen, when reported.
    #[serde(default)]
    pub screen_id: Option<String>,
    /// Raw mode code (0 normal, 1 blackout, 2 freeze).
    #[serde(rename = "displayMode")]
    pub mode_code: i64,
}

/// Display mode of every screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayStateRecord {
    /// Per-screen modes in device order.
    #[serde(rename = "displayState", default)]
    pub screens: Vec<ScreenMode>,
}

impl DisplayStateRecord {
    /// Build a record from per-screen mode codes.
    pub fn from_codes(codes: &[i64]) -> Self {
        Self {
            screens: codes
                .iter()
                .map(|&mode_code| ScreenMode {
                    screen_id: None,
                    mode_code,
                })
                .collect(),
        }
    }

    /// Mode of screen 0, which stands in for the whole wall.
    ///
    /// Other screens are not consulted. Returns `None` when no screens are
    /// reported or the code is unknown.
    pub fn representative_mode(&self) -> Option<DisplayMode> {
        self.screens
            .first()
            .and_then(|screen| DisplayMode::from_code(screen.mode_code))
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Brightness range in percent.
pub const BRIGHTNESS_RANGE: (u8, u8) = (0, 100);
/// Gamma range accepted by the controller.
pub const GAMMA_RANGE: (f64, f64) = (1.0, 4.0);
/// Color temperature range in Kelvin.
pub const COLOR_TEMPERATURE_RANGE: (u32, u32) = (2000, 10000);
/// Highest built-in test pattern index.
pub const MAX_TEST_PATTERN: u8 = 15;

/// What a [`Setting`] changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
    /// Brightness as a fraction in `[0, 1]`.
    Brightness(f64),
    /// Output mode.
    DisplayMode(DisplayMode),
    /// Gamma value.
    Gamma(f64),
    /// Color temperature in Kelvin.
    ColorTemperature(u32),
    /// Built-in test pattern index.
    TestPattern(u8),
    /// Load a preset by name.
    LoadPreset(String),
    /// Route a source by name.
    SwitchSource(String),
}

/// A control action to apply to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    /// The value being applied.
    pub kind: SettingKind,
    /// Screen to target; `None` applies to every screen.
    pub target: Option<String>,
}

impl Setting {
    fn all_screens(kind: SettingKind) -> Self {
        Self { kind, target: None }
    }

    /// Set brightness in percent.
    ///
    /// # Errors
    /// Returns an error if `percent` > 100.
    pub fn brightness(percent: u8) -> Result<Self, EngineError> {
        let (min, max) = BRIGHTNESS_RANGE;
        if percent > max {
            return Err(EngineError::InvalidSetting {
                setting: "brightness",
                value: percent as f64,
                min: min as f64,
                max: max as f64,
            });
        }
        Ok(Self::all_screens(SettingKind::Brightness(
            percent as f64 / 100.0,
        )))
    }

    /// Switch the output mode.
    pub fn display_mode(mode: DisplayMode) -> Self {
        Self::all_screens(SettingKind::DisplayMode(mode))
    }

    /// Set gamma.
    ///
    /// # Errors
    /// Returns an error if `value` is outside 1.0-4.0.
    pub fn gamma(value: f64) -> Result<Self, EngineError> {
        let (min, max) = GAMMA_RANGE;
        if !(min..=max).contains(&value) {
            return Err(EngineError::InvalidSetting {
                setting: "gamma",
                value,
                min,
                max,
            });
        }
        Ok(Self::all_screens(SettingKind::Gamma(value)))
    }

    /// Set color temperature in Kelvin.
    ///
    /// # Errors
    /// Returns an error if `kelvin` is outside 2000-10000.
    pub fn color_temperature(kelvin: u32) -> Result<Self, EngineError> {
        let (min, max) = COLOR_TEMPERATURE_RANGE;
        if !(min..=max).contains(&kelvin) {
            return Err(EngineError::InvalidSetting {
                setting: "color temperature",
                value: kelvin as f64,
                min: min as f64,
                max: max as f64,
            });
        }
        Ok(Self::all_screens(SettingKind::ColorTemperature(kelvin)))
    }

    /// Show a built-in test pattern.
    ///
    /// # Errors
    /// Returns an error if `pattern` > 15.
    pub fn test_pattern(pattern: u8) -> Result<Self, EngineError> {
        if pattern > MAX_TEST_PATTERN {
            return Err(EngineError::InvalidSetting {
                setting: "test pattern",
                value: pattern as f64,
                min: 0.0,
                max: MAX_TEST_PATTERN as f64,
            });
        }
        Ok(Self::all_screens(SettingKind::TestPattern(pattern)))
    }

    /// Load a preset by name.
    pub fn load_preset(name: impl Into<String>) -> Self {
        Self::all_screens(SettingKind::LoadPreset(name.into()))
    }

    /// Route a source by name.
    pub fn switch_source(name: impl Into<String>) -> Self {
        Self::all_screens(SettingKind::SwitchSource(name.into()))
    }

    /// Restrict the setting to one screen.
    pub fn on_screen(mut self, screen_id: impl Into<String>) -> Self {
        self.target = Some(screen_id.into());
        self
    }

    /// Short name of the setting, for logs.
    pub fn name(&self) -> &'static str {
        match self.kind {
            SettingKind::Brightness(_) => "brightness",
            SettingKind::DisplayMode(_) => "display mode",
            SettingKind::Gamma(_) => "gamma",
            SettingKind::ColorTemperature(_) => "color temperature",
            SettingKind::TestPattern(_) => "test pattern",
            SettingKind::LoadPreset(_) => "preset",
            SettingKind::SwitchSource(_) => "source",
        }
    }
}

/// Acknowledgement returned by the device for an applied setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    /// Device status code, 0 on success.
    pub code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_presets_are_kept_in_order() {
        let raw = RawPresets::from_json(json!([
            {"name": "Opening", "sequenceNumber": 1, "state": false},
            {"name": "Keynote", "sequenceNumber": 2, "state": true},
        ]));
        assert!(matches!(raw, RawPresets::Flat(_)));

        let presets = raw.normalize();
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[1], PresetRecord::new("Keynote", 2, true));
    }

    #[test]
    fn test_nested_presets_use_first_screen_only() {
        let raw = RawPresets::from_json(json!([
            {"screenId": "A", "presets": [{"name": "Wide", "sequenceNumber": 1, "state": true}]},
            {"screenId": "B", "presets": [{"name": "Other", "sequenceNumber": 1, "state": true}]},
        ]));
        assert!(matches!(raw, RawPresets::PerScreen(_)));
        assert_eq!(raw.normalize(), vec![PresetRecord::new("Wide", 1, true)]);
    }

    #[test]
    fn test_malformed_presets_normalize_to_empty() {
        for payload in [json!(null), json!({"error": 3}), json!([1, 2, 3]), json!("x")] {
            let raw = RawPresets::from_json(payload);
            assert!(matches!(raw, RawPresets::Unrecognized(_)));
            assert!(raw.normalize().is_empty());
        }
        assert!(RawPresets::from_json(json!([])).normalize().is_empty());
    }

    #[test]
    fn test_preset_fields_default_when_missing() {
        let presets = RawPresets::from_json(json!([{"name": "Bare"}])).normalize();
        assert_eq!(presets, vec![PresetRecord::new("Bare", 0, false)]);
    }

    #[test]
    fn test_display_state_decodes_wire_shape() {
        let record: DisplayStateRecord = serde_json::from_value(json!({
            "displayState": [{"screenId": "A", "displayMode": 1}, {"displayMode": 0}]
        }))
        .unwrap();
        assert_eq!(record.screens.len(), 2);
        assert_eq!(record.representative_mode(), Some(DisplayMode::Blackout));
    }

    #[test]
    fn test_representative_mode_handles_missing_and_unknown() {
        assert_eq!(DisplayStateRecord::default().representative_mode(), None);
        assert_eq!(DisplayStateRecord::from_codes(&[7]).representative_mode(), None);
        assert_eq!(
            DisplayStateRecord::from_codes(&[2, 0]).representative_mode(),
            Some(DisplayMode::Freeze)
        );
    }

    #[test]
    fn test_screen_parameters_decode_and_round_brightness() {
        let params: DisplayParameterSet = serde_json::from_value(json!([
            {"screenId": "A", "brightness": 0.555, "colorTemperature": 6500, "gamma": 2.2}
        ]))
        .unwrap();
        assert_eq!(params[0].brightness_percent(), 56);
        assert_eq!(params[0].color_temperature, 6500);
    }

    #[test]
    fn test_setting_validation() {
        assert!(Setting::brightness(100).is_ok());
        assert!(matches!(
            Setting::brightness(101),
            Err(EngineError::InvalidSetting { setting: "brightness", .. })
        ));
        assert_eq!(
            Setting::brightness(50).unwrap().kind,
            SettingKind::Brightness(0.5)
        );
        assert!(Setting::gamma(0.5).is_err());
        assert!(Setting::gamma(2.2).is_ok());
        assert!(Setting::color_temperature(1500).is_err());
        assert!(Setting::color_temperature(6500).is_ok());
        assert!(Setting::test_pattern(16).is_err());

        let targeted = Setting::display_mode(DisplayMode::Freeze).on_screen("A");
        assert_eq!(targeted.target.as_deref(), Some("A"));
        assert_eq!(targeted.name(), "display mode");
    }
}
