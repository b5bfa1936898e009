// ── Keyed reactive registry ──
//
// Lock-free concurrent storage keyed by MAC address, with push-based
// change notification via a `watch` snapshot. Every mutation publishes
// exactly one new snapshot; a bulk replace with unchanged content
// publishes none.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::MacAddress;

/// A device registry.
///
/// Uses `DashMap` for O(1) concurrent lookups and a `watch` channel for
/// change notification. Snapshots are sorted by MAC so consumers get a
/// stable order.
pub struct Registry<T: Clone + Send + Sync + 'static> {
    by_mac: DashMap<MacAddress, Arc<T>>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Registry<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_mac: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or overwrite an entry. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, mac: MacAddress, entry: T) -> bool {
        let is_new = self.by_mac.insert(mac, Arc::new(entry)).is_none();
        self.publish();
        is_new
    }

    /// Mutate an existing entry in place. Absent keys are left alone and
    /// nothing is published. Returns whether the entry existed.
    pub(crate) fn modify(&self, mac: &MacAddress, f: impl FnOnce(&mut T)) -> bool {
        let Some(mut slot) = self.by_mac.get_mut(mac) else {
            return false;
        };
        f(Arc::make_mut(slot.value_mut()));
        drop(slot);
        self.publish();
        true
    }

    /// Remove an entry. Returns it if it existed.
    pub(crate) fn evict(&self, mac: &MacAddress) -> Option<Arc<T>> {
        let removed = self.by_mac.remove(mac).map(|(_, v)| v);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Remove every entry.
    pub(crate) fn clear(&self) {
        self.by_mac.clear();
        self.publish();
    }

    pub fn get(&self, mac: &MacAddress) -> Option<Arc<T>> {
        self.by_mac.get(mac).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.by_mac.contains_key(mac)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_mac.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mac.is_empty()
    }

    pub fn keys(&self) -> Vec<MacAddress> {
        let mut keys: Vec<MacAddress> = self.by_mac.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let mut entries: Vec<(MacAddress, Arc<T>)> = self
            .by_mac
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_replace` updates even with zero receivers.
        self.snapshot.send_replace(Arc::new(values));
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Registry<T> {
    /// Swap the whole content for `entries`, publishing once.
    ///
    /// Subscribers see either the old or the new set, never a mix. Content
    /// equal to what is already stored publishes nothing.
    pub(crate) fn replace_all(&self, entries: impl IntoIterator<Item = (MacAddress, T)>) {
        let fresh: Vec<(MacAddress, T)> = entries.into_iter().collect();
        if self.holds_exactly(&fresh) {
            return;
        }

        let keep: HashSet<&MacAddress> = fresh.iter().map(|(mac, _)| mac).collect();
        self.by_mac.retain(|mac, _| keep.contains(mac));
        for (mac, entry) in fresh {
            self.by_mac.insert(mac, Arc::new(entry));
        }
        self.publish();
    }

    fn holds_exactly(&self, entries: &[(MacAddress, T)]) -> bool {
        let distinct: HashSet<&MacAddress> = entries.iter().map(|(mac, _)| mac).collect();
        distinct.len() == entries.len()
            && entries.len() == self.by_mac.len()
            && entries.iter().all(|(mac, entry)| {
                self.by_mac
                    .get(mac)
                    .is_some_and(|current| current.value().as_ref() == entry)
            })
    }
}
