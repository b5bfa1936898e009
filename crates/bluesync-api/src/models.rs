// Wire types for the Bluetooth manager REST API.
//
// These mirror the backend's JSON exactly. Domain types live in
// `bluesync-core`; the conversion happens there.

use serde::{Deserialize, Deserializer, Serialize};

// ── Boolean coercion ─────────────────────────────────────────────────

/// Canonical truthiness for backend flags.
///
/// The backend reports flags either as JSON booleans or as bluetoothctl's
/// `"yes"`/`"no"` strings. A value is `true` iff it is `true`, a non-zero
/// number, or a string equal (trimmed, case-insensitive) to `yes`, `true`,
/// `on` or `1`. Everything else is `false`.
pub fn coerce_flag(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON),
        serde_json::Value::String(s) => {
            matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "yes" | "true" | "on" | "1"
            )
        }
        _ => false,
    }
}

/// Serde adapter applying [`coerce_flag`]; missing or `null` is `false`.
pub fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(coerce_flag))
}

/// Lenient integer: accepts numbers and numeric strings, anything else is `None`.
pub(crate) fn de_lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ── Adapters ─────────────────────────────────────────────────────────

/// Envelope of `GET /api/adapters`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterList {
    #[serde(default)]
    pub adapters: Vec<AdapterSummary>,
}

/// One controller as listed by `GET /api/adapters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub default: bool,
}

/// `GET /api/adapters/{id}/info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub powered: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub discoverable: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub pairable: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub discovering: bool,
}

/// Body of `POST /api/adapters/power`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PowerRequest {
    pub power_on: bool,
}

// ── Scan ─────────────────────────────────────────────────────────────

/// `GET /api/scan/status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanStatus {
    #[serde(default, deserialize_with = "de_flag")]
    pub scanning: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

/// Envelope of `GET /api/devices`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// One device as listed by `GET /api/devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub paired: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub connected: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub trusted: bool,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub rssi: Option<i64>,
}

/// One advertised service of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUuid {
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
}

/// `GET /api/devices/{mac}/info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub paired: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub bonded: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub trusted: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub blocked: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub connected: bool,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub battery: Option<i64>,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub rssi: Option<i64>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub uuids: Vec<ServiceUuid>,
}

// ── Commands / misc ─────────────────────────────────────────────────

/// `{success, message}` returned by every command endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default, deserialize_with = "de_flag")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Error body of non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<serde_json::Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flag_coercion_accepts_bluetoothctl_strings() {
        assert!(coerce_flag(&json!(true)));
        assert!(coerce_flag(&json!("yes")));
        assert!(coerce_flag(&json!(" YES ")));
        assert!(coerce_flag(&json!("on")));
        assert!(coerce_flag(&json!("1")));
        assert!(coerce_flag(&json!(1)));

        assert!(!coerce_flag(&json!(false)));
        assert!(!coerce_flag(&json!("no")));
        assert!(!coerce_flag(&json!("")));
        assert!(!coerce_flag(&json!(0)));
        assert!(!coerce_flag(&json!(null)));
        assert!(!coerce_flag(&json!({"powered": true})));
    }

    #[test]
    fn adapter_info_powered_from_string_or_bool() {
        let yes: AdapterInfo =
            serde_json::from_value(json!({"id": "hci0", "powered": "yes"})).unwrap();
        assert!(yes.powered);

        let bool_true: AdapterInfo =
            serde_json::from_value(json!({"id": "hci0", "powered": true})).unwrap();
        assert!(bool_true.powered);

        let missing: AdapterInfo = serde_json::from_value(json!({"id": "hci0"})).unwrap();
        assert!(!missing.powered);
    }

    #[test]
    fn device_record_tolerates_missing_and_null_fields() {
        let record: DeviceRecord = serde_json::from_value(json!({
            "mac": "AA:BB:CC:DD:EE:FF",
            "name": "Headphones",
            "paired": true,
            "rssi": null
        }))
        .unwrap();

        assert!(record.paired);
        assert!(!record.connected);
        assert!(!record.trusted);
        assert_eq!(record.rssi, None);
    }

    #[test]
    fn device_info_parses_uuids_and_battery() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "mac": "AA:BB:CC:DD:EE:FF",
            "name": "Speaker",
            "paired": true,
            "trusted": true,
            "connected": false,
            "battery": "80",
            "rssi": -61,
            "uuids": [
                {"uuid": "0000110b-0000-1000-8000-00805f9b34fb", "name": "Audio Sink"},
                {"name": "AV Remote Control"}
            ]
        }))
        .unwrap();

        assert_eq!(info.battery, Some(80));
        assert_eq!(info.rssi, Some(-61));
        assert_eq!(info.uuids.len(), 2);
        assert_eq!(info.uuids[1].uuid, None);
    }
}
