// ── Central reactive device store ──
//
// The single source of truth consumers read: two independent registries
// plus adapter, scan and poll metadata. Everything is observable through
// `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::Registry;
use crate::model::{Adapter, DiscoveredDevice, MacAddress, PairedDevice, ScanSession};
use crate::stream::RegistryStream;

/// Reactive store for registries and adapter/scan status.
///
/// Writers are the poller (paired registry, adapter), the dispatcher
/// (discovered registry), the scan controller (scan session, clearing the
/// discovered registry) and the sequencer (evicting removed devices).
pub struct DeviceStore {
    pub(crate) discovered: Registry<DiscoveredDevice>,
    pub(crate) paired: Registry<PairedDevice>,
    pub(crate) adapter: watch::Sender<Option<Arc<Adapter>>>,
    pub(crate) scan: watch::Sender<ScanSession>,
    pub(crate) last_poll: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (adapter, _) = watch::channel(None);
        let (scan, _) = watch::channel(ScanSession::inactive());
        let (last_poll, _) = watch::channel(None);

        Self {
            discovered: Registry::new(),
            paired: Registry::new(),
            adapter,
            scan,
            last_poll,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn discovered_snapshot(&self) -> Arc<Vec<Arc<DiscoveredDevice>>> {
        self.discovered.snapshot()
    }

    pub fn paired_snapshot(&self) -> Arc<Vec<Arc<PairedDevice>>> {
        self.paired.snapshot()
    }

    pub fn adapter(&self) -> Option<Arc<Adapter>> {
        self.adapter.borrow().clone()
    }

    pub fn scan_session(&self) -> ScanSession {
        *self.scan.borrow()
    }

    pub fn scan_active(&self) -> bool {
        self.scan.borrow().active
    }

    /// Wall-clock time of the last successful poll.
    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        *self.last_poll.borrow()
    }

    // ── Single-entry lookups ─────────────────────────────────────────

    pub fn discovered_device(&self, mac: &MacAddress) -> Option<Arc<DiscoveredDevice>> {
        self.discovered.get(mac)
    }

    pub fn paired_device(&self, mac: &MacAddress) -> Option<Arc<PairedDevice>> {
        self.paired.get(mac)
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn paired_count(&self) -> usize {
        self.paired.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_discovered(&self) -> RegistryStream<DiscoveredDevice> {
        RegistryStream::new(self.discovered.subscribe())
    }

    pub fn subscribe_paired(&self) -> RegistryStream<PairedDevice> {
        RegistryStream::new(self.paired.subscribe())
    }

    pub fn subscribe_adapter(&self) -> watch::Receiver<Option<Arc<Adapter>>> {
        self.adapter.subscribe()
    }

    pub fn subscribe_scan(&self) -> watch::Receiver<ScanSession> {
        self.scan.subscribe()
    }

    pub fn subscribe_last_poll(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_poll.subscribe()
    }

    // ── Crate-internal mutations ─────────────────────────────────────

    pub(crate) fn set_scan(&self, session: ScanSession) {
        self.scan.send_replace(session);
    }

    /// Publish a new adapter state. An unchanged adapter does not notify.
    pub(crate) fn set_adapter(&self, adapter: Option<Adapter>) {
        self.adapter.send_if_modified(|current| {
            if current.as_deref() == adapter.as_ref() {
                return false;
            }
            *current = adapter.map(Arc::new);
            true
        });
    }

    pub(crate) fn mark_polled(&self, at: DateTime<Utc>) {
        self.last_poll.send_replace(Some(at));
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
