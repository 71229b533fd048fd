//! Values derived from the tracked resources.
//!
//! Everything here is a pure function of the store contents; the dispatcher
//! calls these again whenever the underlying resource changes.

use crate::model::{DisplayStateRecord, PresetRecord, ScreenParameters, Source};

use std::collections::BTreeMap;

/// Active preset name when no preset is loaded.
pub const NOT_ACTIVATED: &str = "Not Activated";

/// Display state label when the mode cannot be determined.
pub const UNKNOWN_MODE: &str = "Unknown";

/// Variable published with the active preset name.
pub const CURRENT_PRESET_VARIABLE: &str = "current_preset_name";

/// Variable published with the representative display mode.
pub const DISPLAY_STATE_VARIABLE: &str = "display_state";

/// Placeholder variable defined while no screens are known.
pub const CONNECTION_STATUS_VARIABLE: &str = "connection_status";

/// Variable values keyed by variable id.
pub type VariableValues = BTreeMap<String, String>;

/// Which dropdown a choice list feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChoiceKind {
    /// Input sources.
    Sources,
    /// Presets.
    Presets,
    /// Screens.
    Screens,
}

/// One dropdown entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Value passed back when selected.
    pub id: String,
    /// Text shown to the operator.
    pub label: String,
}

impl Choice {
    fn same(name: &str) -> Self {
        Self {
            id: name.to_string(),
            label: name.to_string(),
        }
    }
}

/// A variable the control surface should expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Variable id.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl VariableDefinition {
    fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Name of the first preset flagged active, or [`NOT_ACTIVATED`].
pub fn active_preset_name(presets: &[PresetRecord]) -> String {
    presets
        .iter()
        .find(|preset| preset.active)
        .map(|preset| preset.name.clone())
        .unwrap_or_else(|| NOT_ACTIVATED.to_string())
}

/// Dropdown entries for the sources.
pub fn source_choices(sources: &[Source]) -> Vec<Choice> {
    sources.iter().map(|source| Choice::same(&source.name)).collect()
}

/// Dropdown entries for the presets.
pub fn preset_choices(presets: &[PresetRecord]) -> Vec<Choice> {
    presets.iter().map(|preset| Choice::same(&preset.name)).collect()
}

/// Dropdown entries for the screens, skipping screens without an id.
pub fn screen_choices(params: &[ScreenParameters]) -> Vec<Choice> {
    params
        .iter()
        .enumerate()
        .filter(|(_, screen)| !screen.screen_id.is_empty())
        .map(|(index, screen)| Choice {
            id: screen.screen_id.clone(),
            label: format!("Screen {}", index + 1),
        })
        .collect()
}

/// Label for the mode of the representative screen.
pub fn display_mode_label(state: Option<&DisplayStateRecord>) -> &'static str {
    state
        .and_then(DisplayStateRecord::representative_mode)
        .map(|mode| mode.label())
        .unwrap_or(UNKNOWN_MODE)
}

/// Variables to define for the given screens.
pub fn variable_definitions(params: &[ScreenParameters]) -> Vec<VariableDefinition> {
    let mut definitions = Vec::with_capacity(params.len() * 4 + 2);
    if params.is_empty() {
        definitions.push(VariableDefinition::new(
            CONNECTION_STATUS_VARIABLE,
            "Device Status",
        ));
    }
    for index in 0..params.len() {
        let label = format!("Screen {}", index + 1);
        definitions.push(VariableDefinition::new(
            format!("screen_{index}_id"),
            format!("{label} ID"),
        ));
        definitions.push(VariableDefinition::new(
            format!("screen_{index}_brightness"),
            format!("{label} Brightness"),
        ));
        definitions.push(VariableDefinition::new(
            format!("screen_{index}_colortemp"),
            format!("{label} Color Temperature"),
        ));
        definitions.push(VariableDefinition::new(
            format!("screen_{index}_gamma"),
            format!("{label} Gamma"),
        ));
    }
    definitions.push(VariableDefinition::new(
        CURRENT_PRESET_VARIABLE,
        "Current Preset",
    ));
    definitions.push(VariableDefinition::new(
        DISPLAY_STATE_VARIABLE,
        "Display State",
    ));
    definitions
}

/// Current values of every defined variable.
pub fn variable_values(
    params: &[ScreenParameters],
    active_preset_name: &str,
    state: Option<&DisplayStateRecord>,
) -> VariableValues {
    let mut values = VariableValues::new();
    for (index, screen) in params.iter().enumerate() {
        values.insert(format!("screen_{index}_id"), screen.screen_id.clone());
        values.insert(
            format!("screen_{index}_brightness"),
            format!("{}%", screen.brightness_percent()),
        );
        values.insert(
            format!("screen_{index}_colortemp"),
            format!("{}K", screen.color_temperature),
        );
        values.insert(format!("screen_{index}_gamma"), screen.gamma.to_string());
    }
    values.insert(
        CURRENT_PRESET_VARIABLE.to_string(),
        active_preset_name.to_string(),
    );
    values.insert(
        DISPLAY_STATE_VARIABLE.to_string(),
        display_mode_label(state).to_string(),
    );
    values
}
