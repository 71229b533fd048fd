//! Downstream sinks the engine publishes to.

use crate::derived::{Choice, ChoiceKind, VariableDefinition, VariableValues};
use crate::error::SurfaceError;

/// Connection status shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A connection attempt or bootstrap is in progress.
    Connecting,
    /// Connected with live data.
    Ready,
    /// The device could not be reached or bootstrap failed.
    ConnectionFailure,
    /// The configuration is missing or invalid.
    BadConfig,
}

/// The control surface that renders what the engine publishes.
///
/// Implementations decide how things are drawn; the engine only guarantees it
/// calls these with the freshest derived values after a change.
pub trait ControlSurface: Send + Sync + 'static {
    /// Report the connection status.
    fn set_status(&self, status: ConnectionStatus, message: Option<&str>);

    /// Replace the entries of one dropdown.
    fn publish_choice_list(&self, kind: ChoiceKind, choices: &[Choice])
    -> Result<(), SurfaceError>;

    /// Replace the set of defined variables.
    fn publish_variable_definitions(
        &self,
        definitions: &[VariableDefinition],
    ) -> Result<(), SurfaceError>;

    /// Update variable values.
    fn publish_variable_values(&self, values: &VariableValues) -> Result<(), SurfaceError>;

    /// Ask feedback visuals to re-evaluate.
    fn refresh_feedback_visuals(&self) -> Result<(), SurfaceError>;
}
