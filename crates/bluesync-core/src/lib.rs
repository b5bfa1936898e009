// bluesync-core: State synchronization engine between bluesync-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

mod dispatcher;
mod poller;
mod scan;
mod sequencer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{EngineConfig, TlsVerification};
pub use dispatcher::{EngineNotice, NoticeKind};
pub use engine::{Engine, EngineState};
pub use error::CoreError;
pub use poller::PollReason;
pub use sequencer::ActionStep;
pub use store::{DeviceStore, Registry};
pub use stream::{RegistryStream, RegistryWatchStream};

pub use bluesync_api::ChannelState;
pub use bluesync_api::models::{ActionResponse, HealthStatus};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Adapter, DEFAULT_ADAPTER_NAME, DeviceDetails, DiscoveredDevice, MacAddress, PairedDevice,
    ScanSession, ServiceInfo, SignalQuality, UNKNOWN_RSSI_FLOOR, is_audio_device, sort_by_signal,
};
