//! Fixed-cadence poll loop.

use crate::dispatch::FetchSink;
use crate::error::DeviceError;
use crate::store::{Fetched, Resource};

use futures::future::{BoxFuture, join_all};
use log::{debug, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Future returned by a fetch operation.
pub type FetchFuture = BoxFuture<'static, Result<Fetched, DeviceError>>;

/// One resource to refresh every cycle.
pub struct PollTarget {
    resource: Resource,
    fetch: Box<dyn Fn() -> FetchFuture + Send + Sync>,
}

impl PollTarget {
    /// Pair a resource with the operation that fetches it.
    pub fn new<F>(resource: Resource, fetch: F) -> Self
    where
        F: Fn() -> FetchFuture + Send + Sync + 'static,
    {
        Self {
            resource,
            fetch: Box::new(fetch),
        }
    }

    /// The resource this target refreshes.
    pub fn resource(&self) -> Resource {
        self.resource
    }
}

struct Running {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives poll cycles on a tokio task.
///
/// At most one cycle runs at a time: the loop awaits each cycle before it
/// waits for the next tick, and ticks missed meanwhile are dropped rather
/// than queued. [`is_cycle_in_flight`](Self::is_cycle_in_flight) reports
/// whether that cycle is running.
#[derive(Default)]
pub struct PollScheduler {
    running: Option<Running>,
    in_flight: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
}

impl PollScheduler {
    /// Create a stopped scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the poll loop is active.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Whether a cycle is executing right now.
    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of cycles finished since the scheduler was created.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Start polling `targets` every `interval`, feeding results into `sink`.
    ///
    /// The first cycle starts immediately. A loop that is already running is
    /// stopped first.
    pub async fn start(
        &mut self,
        interval: Duration,
        targets: Vec<PollTarget>,
        sink: Arc<dyn FetchSink>,
    ) {
        self.stop().await;

        self.in_flight.store(false, Ordering::SeqCst);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let in_flight = self.in_flight.clone();
        let cycles = self.cycles.clone();
        debug!(
            "starting poll loop: {} targets every {:?}",
            targets.len(),
            interval
        );
        let handle = tokio::spawn(poll_loop(
            interval, targets, sink, cancel_rx, in_flight, cycles,
        ));
        self.running = Some(Running { cancel_tx, handle });
    }

    /// Stop polling.
    ///
    /// No tick fires after this is called. A cycle already in flight runs to
    /// completion and its results are applied before this returns. Calling it
    /// on a stopped scheduler does nothing.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.cancel_tx.send(true);
        if let Err(e) = running.handle.await {
            warn!("poll loop ended abnormally: {}", e);
        }
        debug!("poll loop stopped");
    }
}

async fn poll_loop(
    interval: Duration,
    targets: Vec<PollTarget>,
    sink: Arc<dyn FetchSink>,
    mut cancel_rx: watch::Receiver<bool>,
    in_flight: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let _guard = InFlight::enter(&in_flight);
        trace!("poll cycle starting");
        run_cycle(&targets, sink.as_ref()).await;
        cycles.fetch_add(1, Ordering::SeqCst);
    }
}

/// Marks a cycle as running until dropped, including on unwind.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_cycle(targets: &[PollTarget], sink: &dyn FetchSink) {
    let fetches = targets.iter().map(|target| async move {
        let result = (target.fetch)().await;
        sink.on_fetch(target.resource, result);
    });
    join_all(fetches).await;
}
