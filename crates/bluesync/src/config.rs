//! CLI configuration -- thin wrapper around `bluesync_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --insecure, --timeout).

use std::time::Duration;

use bluesync_core::{EngineConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use bluesync_config::{
    Config, Profile, config_path, load_config, profile_to_engine_config, save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build an `EngineConfig` from the config file, the active profile and
/// CLI overrides. Flags win over profile values.
pub fn build_engine_config(global: &GlobalOpts) -> Result<EngineConfig, CliError> {
    let cfg = load_config()?;
    let name = active_profile_name(global, &cfg);

    let profile = match (cfg.profiles.get(&name), global.server.as_deref()) {
        (Some(profile), Some(server)) => Profile {
            server: server.to_owned(),
            ..profile.clone()
        },
        (Some(profile), None) => profile.clone(),
        (None, Some(server)) => Profile::new(server),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(&cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    let mut engine = profile_to_engine_config(&profile, &cfg.defaults)?;
    if global.insecure {
        engine.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        engine.timeout = Duration::from_secs(secs);
    }
    Ok(engine)
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
