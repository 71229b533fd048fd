//! Connection lifecycle.
//!
//! The [`Engine`] owns one device connection at a time: it validates the
//! configuration, bootstraps the data the control surface needs before it is
//! drawn, starts the poll loop and tears everything down again on shutdown or
//! reconfiguration.

use crate::client::{DeviceClient, DeviceConnector};
use crate::config::EngineConfig;
use crate::dispatch::Reconciler;
use crate::error::{DeviceError, EngineError};
use crate::model::{Ack, Setting};
use crate::scheduler::{PollScheduler, PollTarget};
use crate::store::{Fetched, Resource, StoreSnapshot};
use crate::surface::{ConnectionStatus, ControlSurface};

use futures::FutureExt;
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;

/// Why the engine ended up in [`LifecycleState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The address was missing or malformed; no connection was attempted.
    BadConfig,
    /// The client could not be built or bootstrap failed.
    Connection,
}

impl FailureKind {
    fn summary(self) -> &'static str {
        match self {
            FailureKind::BadConfig => "invalid configuration, not connecting",
            FailureKind::Connection => "connection or initial data fetch failed",
        }
    }
}

/// Where the engine is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No connection and no live data.
    Disconnected,
    /// Building the device client.
    Connecting,
    /// Fetching the data required before the surface is usable.
    Bootstrapping,
    /// Connected and polling.
    Ready,
    /// Gave up; the surface runs with empty data until reconfigured.
    Failed(FailureKind),
}

impl LifecycleState {
    /// The status shown to the operator, if this state has one.
    pub fn status(self) -> Option<ConnectionStatus> {
        match self {
            LifecycleState::Disconnected => None,
            LifecycleState::Connecting | LifecycleState::Bootstrapping => {
                Some(ConnectionStatus::Connecting)
            }
            LifecycleState::Ready => Some(ConnectionStatus::Ready),
            LifecycleState::Failed(FailureKind::BadConfig) => Some(ConnectionStatus::BadConfig),
            LifecycleState::Failed(FailureKind::Connection) => {
                Some(ConnectionStatus::ConnectionFailure)
            }
        }
    }
}

struct Connection<D> {
    client: Arc<D>,
    scheduler: PollScheduler,
}

/// Keeps one controller's state synchronized with a control surface.
///
/// Dropping the engine without calling [`shutdown`](Self::shutdown) still
/// ends the poll loop, but skips releasing the client.
pub struct Engine<C: DeviceConnector, S: ControlSurface> {
    connector: C,
    reconciler: Arc<Reconciler<S>>,
    state: LifecycleState,
    config: Option<EngineConfig>,
    connection: Option<Connection<C::Client>>,
}

impl<C: DeviceConnector, S: ControlSurface> Engine<C, S> {
    /// Create a disconnected engine.
    pub fn new(connector: C, surface: Arc<S>) -> Self {
        Self {
            connector,
            reconciler: Arc::new(Reconciler::new(surface)),
            state: LifecycleState::Disconnected,
            config: None,
            connection: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current operator-facing status.
    pub fn status(&self) -> Option<ConnectionStatus> {
        self.state.status()
    }

    /// The configuration last passed to [`configure`](Self::configure).
    pub fn config(&self) -> Option<&EngineConfig> {
        self.config.as_ref()
    }

    /// The connector used to build device clients.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Copy of the last-known device state.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.reconciler.snapshot()
    }

    /// Whether a poll loop is running.
    pub fn is_polling(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.scheduler.is_running())
    }

    /// Poll cycles completed on the current connection.
    pub fn cycles_completed(&self) -> u64 {
        self.connection
            .as_ref()
            .map_or(0, |connection| connection.scheduler.cycles_completed())
    }

    fn transition(&mut self, next: LifecycleState, message: Option<&str>) {
        debug!("lifecycle: {:?} -> {:?}", self.state, next);
        let previous = self.state.status();
        self.state = next;
        if let Some(status) = next.status() {
            if previous != Some(status) || message.is_some() {
                self.reconciler.surface().set_status(status, message);
            }
        }
    }

    /// Apply a new configuration.
    ///
    /// Any existing connection is torn down completely first, so no poll
    /// cycle from the old configuration survives. On failure the engine ends
    /// in [`LifecycleState::Failed`] with empty data registered on the
    /// surface, and the cause is returned.
    pub async fn configure(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        if self.state != LifecycleState::Disconnected || self.connection.is_some() {
            info!("reloading config");
            self.teardown().await;
        }
        self.config = Some(config.clone());

        let (address, port) = match config.target() {
            Ok(target) => target,
            Err(e) => {
                self.fail(FailureKind::BadConfig, &e);
                return Err(e);
            }
        };

        self.transition(LifecycleState::Connecting, None);
        let client = match self.connector.connect(address, port) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                let e = EngineError::Connect(e);
                self.fail(FailureKind::Connection, &e);
                return Err(e);
            }
        };

        self.transition(LifecycleState::Bootstrapping, None);
        if let Err(e) = self.bootstrap(client.as_ref()).await {
            release(client.as_ref()).await;
            self.fail(FailureKind::Connection, &e);
            return Err(e);
        }
        info!("connected to {}:{} and fetched sources and presets", address, port);

        self.transition(LifecycleState::Ready, None);
        self.reconciler.register_capabilities();

        let mut scheduler = PollScheduler::new();
        scheduler
            .start(
                config.poll_interval(),
                poll_targets(&client),
                self.reconciler.clone(),
            )
            .await;
        self.connection = Some(Connection { client, scheduler });
        Ok(())
    }

    async fn bootstrap(&self, client: &C::Client) -> Result<(), EngineError> {
        let sources = client
            .list_sources()
            .await
            .map_err(|source| EngineError::Bootstrap {
                resource: Resource::Sources,
                source,
            })?;
        let presets = client
            .list_presets()
            .await
            .map_err(|source| EngineError::Bootstrap {
                resource: Resource::Presets,
                source,
            })?;

        self.reconciler.seed(Fetched::Sources(sources));
        self.reconciler.seed(Fetched::Presets(presets));
        Ok(())
    }

    fn fail(&mut self, kind: FailureKind, cause: &EngineError) {
        error!("{}: {}", kind.summary(), cause);
        self.reconciler.reset();
        let message = cause.to_string();
        self.transition(LifecycleState::Failed(kind), Some(message.as_str()));
        self.reconciler.register_capabilities();
    }

    async fn teardown(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.scheduler.stop().await;
            release(connection.client.as_ref()).await;
        }
        self.reconciler.reset();
        self.transition(LifecycleState::Disconnected, None);
    }

    /// Stop polling, release the client and clear all state.
    ///
    /// A cycle already in flight finishes before this returns. Calling it on
    /// a disconnected engine does nothing beyond clearing state.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
        debug!("destroy");
    }

    /// Send a control action to the device.
    ///
    /// The change shows up in the published state on the next poll.
    ///
    /// # Errors
    /// - [`EngineError::NotConnected`] unless the engine is ready
    /// - [`EngineError::Device`] if the device rejects the action
    pub async fn apply_setting(&self, setting: &Setting) -> Result<Ack, EngineError> {
        let Some(connection) = &self.connection else {
            return Err(EngineError::NotConnected);
        };
        info!("applying {}", setting.name());
        Ok(connection.client.apply_setting(setting).await?)
    }
}

async fn release<D: DeviceClient>(client: &D) {
    if let Err(e) = client.close().await {
        warn!("failed to release device client: {}", e);
    }
}

fn poll_target<D, F, Fut>(client: &Arc<D>, resource: Resource, fetch: F) -> PollTarget
where
    D: DeviceClient,
    F: Fn(Arc<D>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Fetched, DeviceError>> + Send + 'static,
{
    let client = client.clone();
    PollTarget::new(resource, move || fetch(client.clone()).boxed())
}

fn poll_targets<D: DeviceClient>(client: &Arc<D>) -> Vec<PollTarget> {
    vec![
        poll_target(client, Resource::Sources, |client| async move {
            client.list_sources().await.map(Fetched::Sources)
        }),
        poll_target(client, Resource::Presets, |client| async move {
            client.list_presets().await.map(Fetched::Presets)
        }),
        poll_target(client, Resource::DisplayParameters, |client| async move {
            client
                .get_display_parameters()
                .await
                .map(Fetched::DisplayParameters)
        }),
        poll_target(client, Resource::DisplayState, |client| async move {
            client.get_display_state().await.map(Fetched::DisplayState)
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_states_map_to_statuses() {
        assert_eq!(LifecycleState::Disconnected.status(), None);
        assert_eq!(
            LifecycleState::Bootstrapping.status(),
            Some(ConnectionStatus::Connecting)
        );
        assert_eq!(
            LifecycleState::Failed(FailureKind::BadConfig).status(),
            Some(ConnectionStatus::BadConfig)
        );
        assert_eq!(
            LifecycleState::Failed(FailureKind::Connection).status(),
            Some(ConnectionStatus::ConnectionFailure)
        );
    }

    #[test]
    fn test_bad_config_is_not_reported_as_connection_failure() {
        assert!(!FailureKind::BadConfig.summary().contains("connection"));
        assert!(FailureKind::BadConfig.summary().contains("configuration"));
        assert!(FailureKind::Connection.summary().contains("connection"));
    }
}
