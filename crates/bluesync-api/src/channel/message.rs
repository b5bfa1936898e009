// Inbound push-channel payloads.

use serde::{Deserialize, Serialize};

use crate::models::de_lenient_i64;

/// A parsed message from the push channel.
///
/// The backend sends JSON objects discriminated by `type`. Unknown types
/// deserialize to [`InboundMessage::Unknown`] so new server events never
/// break the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// A device was seen during an active scan.
    Discovered {
        mac: String,
        #[serde(default)]
        name: Option<String>,
        /// ISO-8601 timestamp from the backend.
        #[serde(default)]
        discovered_at: Option<String>,
    },
    /// Fresh signal strength for a device.
    RssiUpdate {
        mac: String,
        #[serde(default, deserialize_with = "de_lenient_i64")]
        rssi: Option<i64>,
    },
    DeviceConnected {
        #[serde(default)]
        mac: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    DeviceDisconnected {
        #[serde(default)]
        mac: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    DevicePaired {
        #[serde(default)]
        mac: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    DeviceRemoved {
        #[serde(default)]
        mac: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Reply to our keepalive.
    Pong,
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse one text frame. Malformed payloads are logged and dropped.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, payload = text, "dropping malformed channel message");
                None
            }
        }
    }
}
