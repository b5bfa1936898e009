// ── Snapshot poll application ──
//
// Applies one poll result to the DeviceStore. The paired registry is
// replaced wholesale with the paired subset; push events never take this
// path.

use chrono::Utc;

use super::DeviceStore;
use crate::model::{Adapter, PairedDevice};

/// Everything one poll fetched.
#[derive(Debug, Clone, Default)]
pub(crate) struct PollSnapshot {
    /// Full device list as reported, paired or not.
    pub devices: Vec<PairedDevice>,
    /// `None` when the backend lists no adapter.
    pub adapter: Option<Adapter>,
}

impl DeviceStore {
    /// Apply a successful poll. Idempotent: a poll equal to the last one
    /// leaves the paired and adapter watches untouched.
    pub(crate) fn apply_poll(&self, snap: PollSnapshot) {
        let paired = snap
            .devices
            .into_iter()
            .filter(|d| d.paired)
            .map(|d| (d.mac.clone(), d));
        self.paired.replace_all(paired);
        self.set_adapter(snap.adapter);
        self.mark_polled(Utc::now());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::MacAddress;

    fn device(mac: &str, paired: bool) -> PairedDevice {
        PairedDevice {
            mac: MacAddress::new(mac),
            name: None,
            connected: false,
            paired,
            trusted: false,
            rssi: None,
        }
    }

    fn adapter(powered: bool) -> Adapter {
        Adapter {
            id: "hci0".into(),
            name: "pi".into(),
            mac: None,
            powered,
            discoverable: false,
            pairable: true,
            discovering: false,
        }
    }

    #[test]
    fn keeps_only_paired_subset() {
        let store = DeviceStore::new();
        store.apply_poll(PollSnapshot {
            devices: vec![
                device("00:00:00:00:00:01", true),
                device("00:00:00:00:00:02", false),
                device("00:00:00:00:00:03", true),
            ],
            adapter: Some(adapter(true)),
        });

        assert_eq!(
            store.paired.keys(),
            vec![
                MacAddress::new("00:00:00:00:00:01"),
                MacAddress::new("00:00:00:00:00:03")
            ]
        );
        assert!(store.adapter().is_some_and(|a| a.powered));
        assert!(store.last_poll().is_some());
    }

    #[test]
    fn later_poll_replaces_earlier_one() {
        let store = DeviceStore::new();
        store.apply_poll(PollSnapshot {
            devices: vec![device("00:00:00:00:00:01", true)],
            adapter: Some(adapter(true)),
        });
        store.apply_poll(PollSnapshot {
            devices: vec![device("00:00:00:00:00:02", true)],
            adapter: None,
        });

        assert_eq!(store.paired.keys(), vec![MacAddress::new("00:00:00:00:00:02")]);
        assert!(store.adapter().is_none());
    }

    #[test]
    fn identical_poll_is_unobservable() {
        let store = DeviceStore::new();
        let snap = PollSnapshot {
            devices: vec![
                device("00:00:00:00:00:01", true),
                device("00:00:00:00:00:02", false),
            ],
            adapter: Some(adapter(true)),
        };
        store.apply_poll(snap.clone());

        let mut paired_rx = store.paired.subscribe();
        let mut adapter_rx = store.subscribe_adapter();
        paired_rx.borrow_and_update();
        adapter_rx.borrow_and_update();

        store.apply_poll(snap.clone());
        assert!(!paired_rx.has_changed().unwrap());
        assert!(!adapter_rx.has_changed().unwrap());

        store.apply_poll(PollSnapshot {
            adapter: Some(adapter(false)),
            ..snap
        });
        assert!(!paired_rx.has_changed().unwrap());
        assert!(adapter_rx.has_changed().unwrap());
    }

    #[test]
    fn poll_leaves_discovered_registry_alone() {
        let store = DeviceStore::new();
        store.discovered.upsert(
            MacAddress::new("00:00:00:00:00:09"),
            crate::model::DiscoveredDevice {
                mac: MacAddress::new("00:00:00:00:00:09"),
                name: None,
                discovered_at: Utc::now(),
                rssi: None,
            },
        );
        store.apply_poll(PollSnapshot::default());
        assert_eq!(store.discovered_count(), 1);
    }
}
