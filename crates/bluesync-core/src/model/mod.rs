// ── Domain model ──
//
// Types consumers see. Wire types from `bluesync-api` are converted into
// these in `convert.rs`.

pub mod adapter;
pub mod device;
pub mod mac;

pub use adapter::{Adapter, DEFAULT_ADAPTER_NAME, ScanSession};
pub use device::{
    DeviceDetails, DiscoveredDevice, PairedDevice, ServiceInfo, SignalQuality, UNKNOWN_RSSI_FLOOR,
    is_audio_device, sort_by_signal,
};
pub use mac::MacAddress;
