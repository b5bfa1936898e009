//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use bluesync_config::ConfigError;
use bluesync_core::{ActionStep, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Bluetooth backend at {url}")]
    #[diagnostic(
        code(bluesync::connection_failed),
        help(
            "Check that the backend is running and the URL includes any proxy prefix.\n\
             Reason: {reason}\n\
             Try: bluesync health --server <URL>"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(bluesync::timeout),
        help("Increase the timeout with --timeout or check backend responsiveness.")
    )]
    Timeout,

    // ── Backend ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(bluesync::rejected))]
    Rejected { status: u16, message: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(bluesync::not_found),
        help("Run: bluesync {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{step} failed: {message}")]
    #[diagnostic(
        code(bluesync::step_failed),
        help("Earlier steps were kept. Put the device in pairing mode and retry.")
    )]
    StepFailed { step: ActionStep, message: String },

    #[error("No Bluetooth adapter available")]
    #[diagnostic(
        code(bluesync::no_adapter),
        help("Check that the backend host has a Bluetooth controller attached.")
    )]
    NoAdapter,

    #[error("Unexpected backend behaviour: {message}")]
    #[diagnostic(code(bluesync::internal))]
    Internal { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bluesync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(bluesync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: bluesync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(bluesync::no_config),
        help(
            "Pass --server <URL>, or create a profile with: bluesync config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(bluesync::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(bluesync::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(bluesync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(bluesync::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(bluesync::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::NoAdapter => exit_code::NOT_FOUND,
            Self::Rejected { .. } | Self::StepFailed { .. } => exit_code::REJECTED,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url: if url.is_empty() {
                    "(push channel)".into()
                } else {
                    url
                },
                reason,
            },

            CoreError::Timeout => CliError::Timeout,

            CoreError::Rejected { status, detail } => CliError::Rejected {
                status,
                message: detail,
            },

            CoreError::StepFailed { step, message } => CliError::StepFailed { step, message },

            CoreError::NoAdapter => CliError::NoAdapter,

            CoreError::EngineStopped => CliError::Internal {
                message: "engine stopped before the command completed".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "server".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_keeps_step_and_message() {
        let err = CliError::from(CoreError::StepFailed {
            step: ActionStep::Trust,
            message: "Device not available".into(),
        });
        assert_eq!(err.to_string(), "trust failed: Device not available");
        assert_eq!(err.exit_code(), exit_code::REJECTED);
    }

    #[test]
    fn connection_failure_exit_code() {
        let err = CliError::from(CoreError::ConnectionFailed {
            url: "http://pi:8099/api/devices".into(),
            reason: "connection refused".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_validation_is_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "server".into(),
            reason: "invalid URL: nope".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
