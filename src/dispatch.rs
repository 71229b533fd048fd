//! Reconciliation of derived state after a detected change.

use crate::derived::{self, ChoiceKind};
use crate::error::{DeviceError, SurfaceError};
use crate::store::{ApplyOutcome, Fetched, Resource, StateStore, StoreSnapshot};
use crate::surface::ControlSurface;

use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Receives the result of every fetch in a poll cycle.
pub trait FetchSink: Send + Sync + 'static {
    /// Handle one fetch result.
    fn on_fetch(&self, resource: Resource, result: Result<Fetched, DeviceError>) -> ApplyOutcome;
}

/// Owns the [`StateStore`] and runs the recomputations that depend on each
/// resource.
///
/// The store lock is held for the whole apply-and-reconcile step, so readers
/// never observe a value whose derived fields have not caught up.
pub struct Reconciler<S: ControlSurface> {
    store: Mutex<StateStore>,
    surface: Arc<S>,
}

impl<S: ControlSurface> Reconciler<S> {
    /// Create a reconciler with an empty store.
    pub fn new(surface: Arc<S>) -> Self {
        Self {
            store: Mutex::new(StateStore::new()),
            surface,
        }
    }

    /// The control surface updates are published to.
    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    fn lock(&self) -> MutexGuard<'_, StateStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy the current store contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    /// Clear every tracked resource and derived field.
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Store a value without running any recomputation.
    ///
    /// Bootstrap uses this before [`register_capabilities`](Self::register_capabilities)
    /// publishes everything at once.
    pub(crate) fn seed(&self, fetched: Fetched) -> ApplyOutcome {
        let resource = fetched.resource();
        self.lock().apply(resource, Ok(fetched))
    }

    /// Run the change detector for `resource` and reconcile on change.
    pub fn apply(&self, resource: Resource, result: Result<Fetched, DeviceError>) -> ApplyOutcome {
        let mut store = self.lock();
        let outcome = store.apply(resource, result);
        if outcome == ApplyOutcome::Changed {
            debug!("{} updated", resource);
            self.reconcile(&mut store, resource);
        }
        outcome
    }

    fn reconcile(&self, store: &mut StateStore, resource: Resource) {
        match resource {
            Resource::Sources => {
                let choices = derived::source_choices(store.sources());
                self.step(
                    resource,
                    "source choices",
                    self.surface.publish_choice_list(ChoiceKind::Sources, &choices),
                );
                store.derived_mut().source_choices = choices;
            }
            Resource::Presets => {
                let choices = derived::preset_choices(store.presets());
                self.step(
                    resource,
                    "preset choices",
                    self.surface.publish_choice_list(ChoiceKind::Presets, &choices),
                );
                store.derived_mut().preset_choices = choices;

                let name = derived::active_preset_name(store.presets());
                if name != store.derived().active_preset_name {
                    debug!("active preset is now '{}'", name);
                    store.derived_mut().active_preset_name = name;
                    self.notify(store, resource);
                }
            }
            Resource::DisplayParameters => {
                let params = store.display_parameters();
                // also republish when the last identified screen disappears
                if params.iter().any(|screen| !screen.screen_id.is_empty())
                    || !store.derived().screen_choices.is_empty()
                {
                    let choices = derived::screen_choices(params);
                    self.step(
                        resource,
                        "screen choices",
                        self.surface.publish_choice_list(ChoiceKind::Screens, &choices),
                    );
                    store.derived_mut().screen_choices = choices;
                }

                let count = store.display_parameters().len();
                if count != store.derived().screen_count {
                    let definitions = derived::variable_definitions(store.display_parameters());
                    self.step(
                        resource,
                        "variable definitions",
                        self.surface.publish_variable_definitions(&definitions),
                    );
                    store.derived_mut().screen_count = count;
                }
                self.notify(store, resource);
            }
            Resource::DisplayState => self.notify(store, resource),
        }
    }

    fn notify(&self, store: &StateStore, resource: Resource) {
        let values = derived::variable_values(
            store.display_parameters(),
            &store.derived().active_preset_name,
            store.display_state(),
        );
        self.step(
            resource,
            "variable values",
            self.surface.publish_variable_values(&values),
        );
        self.step(
            resource,
            "feedback refresh",
            self.surface.refresh_feedback_visuals(),
        );
    }

    fn step(&self, resource: Resource, what: &str, result: Result<(), SurfaceError>) {
        if let Err(e) = result {
            warn!("{} reconciliation: {} failed: {}", resource, what, e);
        }
    }

    /// Recompute every derived field and publish all of it.
    ///
    /// Used when capabilities are (re)registered, whether the store holds live
    /// data or was just reset.
    pub fn register_capabilities(&self) {
        let mut store = self.lock();

        let sources = derived::source_choices(store.sources());
        let presets = derived::preset_choices(store.presets());
        let screens = derived::screen_choices(store.display_parameters());
        let definitions = derived::variable_definitions(store.display_parameters());
        let active = derived::active_preset_name(store.presets());

        for (kind, choices) in [
            (ChoiceKind::Sources, &sources),
            (ChoiceKind::Presets, &presets),
            (ChoiceKind::Screens, &screens),
        ] {
            if let Err(e) = self.surface.publish_choice_list(kind, choices) {
                warn!("registering {:?} choices failed: {}", kind, e);
            }
        }
        if let Err(e) = self.surface.publish_variable_definitions(&definitions) {
            warn!("registering variable definitions failed: {}", e);
        }

        let screen_count = store.display_parameters().len();
        let fields = store.derived_mut();
        fields.source_choices = sources;
        fields.preset_choices = presets;
        fields.screen_choices = screens;
        fields.active_preset_name = active;
        fields.screen_count = screen_count;

        let values = derived::variable_values(
            store.display_parameters(),
            &store.derived().active_preset_name,
            store.display_state(),
        );
        if let Err(e) = self.surface.publish_variable_values(&values) {
            warn!("publishing variable values failed: {}", e);
        }
        if let Err(e) = self.surface.refresh_feedback_visuals() {
            warn!("refreshing feedbacks failed: {}", e);
        }
    }
}

impl<S: ControlSurface> FetchSink for Reconciler<S> {
    fn on_fetch(&self, resource: Resource, result: Result<Fetched, DeviceError>) -> ApplyOutcome {
        self.apply(resource, result)
    }
}
