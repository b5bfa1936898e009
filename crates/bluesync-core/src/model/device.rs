// ── Device domain types ──

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MacAddress;

/// Signal strength assumed for devices that never reported one.
pub const UNKNOWN_RSSI_FLOOR: i64 = -100;

/// Name fragments that mark a device as audio hardware.
const AUDIO_KEYWORDS: [&str; 6] = ["headphone", "headset", "speaker", "sound", "audio", "music"];

/// A device seen during the current scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub mac: MacAddress,
    pub name: Option<String>,
    pub discovered_at: DateTime<Utc>,
    /// Unknown until the first signal update.
    pub rssi: Option<i64>,
}

impl DiscoveredDevice {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Device")
    }

    pub fn signal_quality(&self) -> SignalQuality {
        SignalQuality::from_rssi(self.rssi)
    }

    pub fn is_audio(&self) -> bool {
        is_audio_device(self.name.as_deref())
    }
}

/// A device the backend reports as paired. Only ever written by a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub mac: MacAddress,
    pub name: Option<String>,
    pub connected: bool,
    pub paired: bool,
    pub trusted: bool,
    pub rssi: Option<i64>,
}

impl PairedDevice {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.mac.as_str())
    }

    pub fn signal_quality(&self) -> SignalQuality {
        SignalQuality::from_rssi(self.rssi)
    }
}

/// One service advertised by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub uuid: Option<String>,
    pub name: String,
}

/// Full read-back of a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetails {
    pub mac: MacAddress,
    pub name: Option<String>,
    pub alias: Option<String>,
    pub paired: bool,
    pub bonded: bool,
    pub trusted: bool,
    pub blocked: bool,
    pub connected: bool,
    /// Battery percentage, when the device exposes one.
    pub battery: Option<u8>,
    pub rssi: Option<i64>,
    pub class: Option<String>,
    pub icon: Option<String>,
    pub services: Vec<ServiceInfo>,
}

impl DeviceDetails {
    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(self.mac.as_str())
    }
}

// ── Signal strength ──────────────────────────────────────────────────

/// Coarse signal bucket for display.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignalQuality {
    Unknown,
    Weak,
    Fair,
    Good,
    Excellent,
}

impl SignalQuality {
    pub fn from_rssi(rssi: Option<i64>) -> Self {
        match rssi {
            None => Self::Unknown,
            Some(r) if r >= -50 => Self::Excellent,
            Some(r) if r >= -60 => Self::Good,
            Some(r) if r >= -70 => Self::Fair,
            Some(_) => Self::Weak,
        }
    }

    /// Number of filled bars out of four.
    pub fn bars(self) -> u8 {
        match self {
            Self::Excellent => 4,
            Self::Good => 3,
            Self::Fair => 2,
            Self::Weak => 1,
            Self::Unknown => 0,
        }
    }
}

// ── View helpers ─────────────────────────────────────────────────────

/// Whether a device name looks like audio hardware.
pub fn is_audio_device(name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    let lower = name.to_lowercase();
    AUDIO_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Strongest signal first; devices without a reading sort as
/// [`UNKNOWN_RSSI_FLOOR`]. Ties keep their order.
pub fn sort_by_signal(devices: &mut [Arc<DiscoveredDevice>]) {
    devices.sort_by_key(|d| Reverse(d.rssi.unwrap_or(UNKNOWN_RSSI_FLOOR)));
}
