// ── API-to-domain type conversions ──
//
// Bridges raw `bluesync_api::models` types into `bluesync_core::model`.
// Flag coercion already happened during deserialization, so everything
// here is field mapping, MAC normalization and defaults.

use chrono::{DateTime, NaiveDateTime, Utc};

use bluesync_api::models::{AdapterInfo, AdapterSummary, DeviceInfo, DeviceRecord, ServiceUuid};

use crate::model::{
    Adapter, DEFAULT_ADAPTER_NAME, DeviceDetails, DiscoveredDevice, MacAddress, PairedDevice,
    ServiceInfo,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a backend timestamp. The backend emits naive ISO-8601 local
/// time; those are taken as UTC. Offsets are honoured when present.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Empty strings from bluetoothctl count as absent.
fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

// ── Adapter ────────────────────────────────────────────────────────

impl Adapter {
    /// Merge the adapter list entry with its info record.
    pub(crate) fn from_wire(summary: AdapterSummary, info: AdapterInfo) -> Self {
        let name = non_empty(info.alias)
            .or_else(|| non_empty(info.name))
            .or_else(|| non_empty(summary.name))
            .unwrap_or_else(|| DEFAULT_ADAPTER_NAME.to_owned());

        Self {
            id: summary.id,
            name,
            mac: summary.mac.map(MacAddress::new),
            powered: info.powered,
            discoverable: info.discoverable,
            pairable: info.pairable,
            discovering: info.discovering,
        }
    }
}

// ── Devices ────────────────────────────────────────────────────────

impl From<DeviceRecord> for PairedDevice {
    fn from(r: DeviceRecord) -> Self {
        Self {
            mac: MacAddress::new(&r.mac),
            name: non_empty(r.name),
            connected: r.connected,
            paired: r.paired,
            trusted: r.trusted,
            rssi: r.rssi,
        }
    }
}

impl DiscoveredDevice {
    /// Entry for a `discovered` push event. Signal strength starts unknown;
    /// an unparsable timestamp falls back to now.
    pub(crate) fn from_event(mac: &str, name: Option<String>, discovered_at: Option<&str>) -> Self {
        Self {
            mac: MacAddress::new(mac),
            name: non_empty(name),
            discovered_at: parse_timestamp(discovered_at).unwrap_or_else(Utc::now),
            rssi: None,
        }
    }
}

impl From<ServiceUuid> for ServiceInfo {
    fn from(s: ServiceUuid) -> Self {
        Self {
            uuid: s.uuid,
            name: s.name,
        }
    }
}

impl From<DeviceInfo> for DeviceDetails {
    fn from(d: DeviceInfo) -> Self {
        Self {
            mac: MacAddress::new(&d.mac),
            name: non_empty(d.name),
            alias: non_empty(d.alias),
            paired: d.paired,
            bonded: d.bonded,
            trusted: d.trusted,
            blocked: d.blocked,
            connected: d.connected,
            battery: d.battery.and_then(|b| u8::try_from(b).ok()),
            rssi: d.rssi,
            class: d.class,
            icon: d.icon,
            services: d.uuids.into_iter().map(ServiceInfo::from).collect(),
        }
    }
}
