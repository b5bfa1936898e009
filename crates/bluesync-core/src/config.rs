// ── Runtime engine configuration ──
//
// Describes *where* the backend is and how the engine paces itself.
// Never touches disk: the CLI builds an `EngineConfig` (usually from a
// `bluesync-config` profile) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use bluesync_api::channel::ChannelConfig;
use bluesync_api::transport::{TlsMode, TransportConfig};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled web PKI roots (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed add-on certificates).
    DangerAcceptInvalid,
}

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend base URL including any reverse-proxy path prefix.
    pub url: Url,
    /// Push-channel URL. Derived from `url` when unset.
    pub channel_url: Option<Url>,
    pub tls: TlsVerification,
    /// Upper bound for every request/response call.
    pub timeout: Duration,
    /// Snapshot poll cadence. `Duration::ZERO` disables periodic polling.
    pub poll_interval: Duration,
    /// Delay before reconnecting a dropped push channel.
    pub reconnect_delay: Duration,
    /// Keepalive interval while the push channel is open. `Duration::ZERO`
    /// sends no keepalives.
    pub keepalive_interval: Duration,
    /// Lifetime of a scan session before it stops itself.
    pub scan_duration: Duration,
    /// Whether to run the push channel at all.
    pub channel_enabled: bool,
}

impl EngineConfig {
    /// Defaults for everything but the backend URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            channel_url: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
            scan_duration: Duration::from_secs(30),
            channel_enabled: true,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }

    pub(crate) fn channel(&self) -> ChannelConfig {
        ChannelConfig {
            reconnect_delay: self.reconnect_delay,
            keepalive_interval: self.keepalive_interval,
        }
    }
}
