// ── Snapshot poller ──
//
// Pulls the full device list and adapter info and applies them to the
// store. Runs on a fixed cadence (skipped while scanning) and on request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use bluesync_api::BluetoothClient;

use crate::error::CoreError;
use crate::model::{Adapter, PairedDevice};
use crate::store::DeviceStore;
use crate::store::refresh::PollSnapshot;

const POLL_REQUEST_CAPACITY: usize = 16;

/// Why a poll ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PollReason {
    Startup,
    Cadence,
    /// A push event said the paired set changed.
    PushEvent,
    /// The dispatcher fell behind and dropped messages.
    Lagged,
    /// An explicit action just completed.
    Action,
    /// Asked for by a consumer.
    Manual,
}

/// Fetches snapshots and applies them to the store.
pub(crate) struct Poller {
    client: BluetoothClient,
    store: Arc<DeviceStore>,
}

impl Poller {
    pub(crate) fn new(client: BluetoothClient, store: Arc<DeviceStore>) -> Self {
        Self { client, store }
    }

    /// Fetch and apply one snapshot. On failure the store is untouched.
    pub(crate) async fn poll_now(&self, reason: PollReason) -> Result<(), CoreError> {
        debug!(%reason, "polling backend");
        let (devices, adapter) = tokio::join!(self.client.list_devices(), self.fetch_adapter());
        let snapshot = PollSnapshot {
            devices: devices?.into_iter().map(PairedDevice::from).collect(),
            adapter: adapter?,
        };
        self.store.apply_poll(snapshot);
        Ok(())
    }

    /// Poll, logging instead of returning failures.
    pub(crate) async fn poll_logged(&self, reason: PollReason) {
        if let Err(e) = self.poll_now(reason).await {
            warn!(error = %e, %reason, "poll failed");
        }
    }

    /// Info for the first adapter the backend lists, if any.
    async fn fetch_adapter(&self) -> Result<Option<Adapter>, bluesync_api::Error> {
        let Some(first) = self.client.list_adapters().await?.into_iter().next() else {
            return Ok(None);
        };
        let info = self.client.adapter_info(&first.id).await?;
        Ok(Some(Adapter::from_wire(first, info)))
    }
}

// ── Out-of-cadence requests ──────────────────────────────────────────

/// Cheap handle for asking the poll task to run.
///
/// Requests never block: when the queue is full a poll is already
/// pending, and that one will observe the same backend state.
#[derive(Debug, Clone)]
pub(crate) struct PollTrigger {
    tx: mpsc::Sender<PollReason>,
}

impl PollTrigger {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<PollReason>) {
        let (tx, rx) = mpsc::channel(POLL_REQUEST_CAPACITY);
        (Self { tx }, rx)
    }

    pub(crate) fn request(&self, reason: PollReason) {
        if self.tx.try_send(reason).is_err() {
            trace!(%reason, "poll already queued");
        }
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Poll on `period` unless a scan is running, and whenever requested.
///
/// `period == 0` disables the cadence; requests are still served.
pub(crate) async fn poll_task(
    poller: Arc<Poller>,
    store: Arc<DeviceStore>,
    period: Duration,
    mut requests: mpsc::Receiver<PollReason>,
    cancel: CancellationToken,
) {
    // A zero period would panic in `interval`; park the cadence instead.
    let cadence_enabled = !period.is_zero();
    let mut interval = tokio::time::interval(if cadence_enabled {
        period
    } else {
        Duration::from_secs(3600)
    });
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = requests.recv() => {
                let Some(reason) = request else { break };
                // Collapse a burst of requests into one round trip.
                while requests.try_recv().is_ok() {}
                poller.poll_logged(reason).await;
            }
            _ = interval.tick(), if cadence_enabled => {
                if store.scan_active() {
                    trace!("scan active, skipping cadence poll");
                    continue;
                }
                poller.poll_logged(PollReason::Cadence).await;
            }
        }
    }
}
