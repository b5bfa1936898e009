// bluesync-api: Async Rust client for the Bluetooth manager backend (REST + push channel)

pub mod channel;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use channel::{ChannelConfig, ChannelHandle, ChannelState, InboundMessage};
pub use client::BluetoothClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
