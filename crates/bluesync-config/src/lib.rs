//! Profile configuration for bluesync tools.
//!
//! TOML profiles plus `BLUESYNC_` environment overrides, translated into
//! `bluesync_core::EngineConfig`. The CLI layers its own flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bluesync_core::{EngineConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Fresh config with a single `default` profile pointing at `server`.
    pub fn starter(server: &str) -> Self {
        let mut cfg = Self::default();
        cfg.profiles.insert("default".into(), Profile::new(server));
        cfg
    }

    /// Look up `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { name })
    }
}

/// Settings shared by every profile. Timings are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Snapshot poll cadence; 0 disables periodic polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,

    #[serde(default = "default_keepalive")]
    pub keepalive_interval: u64,

    #[serde(default = "default_scan_duration")]
    pub scan_duration: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            reconnect_delay: default_reconnect_delay(),
            keepalive_interval: default_keepalive(),
            scan_duration: default_scan_duration(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_keepalive() -> u64 {
    30
}
fn default_scan_duration() -> u64 {
    30
}

/// A named backend profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL, including any reverse-proxy prefix
    /// (e.g. "http://homeassistant.local:8123/api/hassio_ingress/abc").
    pub server: String,

    /// Explicit push-channel URL, when it cannot be derived from `server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,

    /// Path to custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_duration: Option<u64>,

    /// Disable the push channel for this backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<bool>,
}

impl Profile {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_owned(),
            channel_url: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            scan_duration: None,
            channel: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "bluesync", "bluesync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bluesync");
    p
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` plus environment. A missing file yields
/// defaults. Nested keys use a double underscore, e.g.
/// `BLUESYNC_DEFAULTS__SCAN_DURATION=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BLUESYNC_").split("__"));

    Ok(figment.extract()?)
}

/// Write config to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build an `EngineConfig` from a profile and the shared defaults.
pub fn profile_to_engine_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<EngineConfig, ConfigError> {
    let url = parse_url("server", &profile.server)?;
    let mut config = EngineConfig::new(url);

    config.channel_url = profile
        .channel_url
        .as_deref()
        .map(|raw| parse_url("channel_url", raw))
        .transpose()?;

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    config.timeout = Duration::from_secs(timeout);
    config.poll_interval = Duration::from_secs(defaults.poll_interval);
    config.reconnect_delay = Duration::from_secs(defaults.reconnect_delay.max(1));
    config.keepalive_interval = Duration::from_secs(defaults.keepalive_interval.max(1));
    config.scan_duration =
        Duration::from_secs(profile.scan_duration.unwrap_or(defaults.scan_duration).max(1));
    config.channel_enabled = profile.channel.unwrap_or(true);

    Ok(config)
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults, Defaults::default());
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "pi"

[defaults]
poll_interval = 10
scan_duration = 20

[profiles.pi]
server = "https://ha.local/api/hassio_ingress/abc/"
insecure = true
scan_duration = 45
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "pi");

        let engine = profile_to_engine_config(profile, &cfg.defaults).unwrap();
        assert_eq!(engine.url.as_str(), "https://ha.local/api/hassio_ingress/abc/");
        assert_eq!(engine.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(engine.poll_interval, Duration::from_secs(10));
        assert_eq!(engine.scan_duration, Duration::from_secs(45));
        assert_eq!(engine.reconnect_delay, Duration::from_secs(5));
        assert!(engine.channel_enabled);
    }

    #[test]
    fn zero_poll_interval_disables_cadence() {
        let defaults = Defaults {
            poll_interval: 0,
            ..Defaults::default()
        };
        let engine = profile_to_engine_config(&Profile::new("http://pi:8099"), &defaults).unwrap();
        assert_eq!(engine.poll_interval, Duration::ZERO);
    }

    #[test]
    fn invalid_server_is_rejected() {
        let err = profile_to_engine_config(&Profile::new("not a url"), &Defaults::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid server: invalid URL: not a url");
    }

    #[test]
    fn unknown_profile_is_reported() {
        let cfg = Config::starter("http://pi:8099");
        let err = cfg.profile(Some("garage")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { name } if name == "garage"));
    }

    #[test]
    fn saved_starter_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config::starter("http://pi:8099");

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded, cfg);
    }
}
