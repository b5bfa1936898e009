// ── Core error types ──
//
// User-facing errors from bluesync-core. Consumers never see reqwest or
// tungstenite errors directly; `From<bluesync_api::Error>` translates
// transport-layer failures into these variants.

use thiserror::Error;

use crate::sequencer::ActionStep;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach Bluetooth backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to Bluetooth backend timed out")]
    Timeout,

    // ── Operation errors ─────────────────────────────────────────────
    /// The backend answered with a non-success status. `detail` is its
    /// message verbatim.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    /// A multi-step workflow aborted at `step`.
    #[error("{step} failed: {message}")]
    StepFailed { step: ActionStep, message: String },

    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("Engine is not running")]
    EngineStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status from the backend, for rejected requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bluesync_api::Error> for CoreError {
    fn from(err: bluesync_api::Error) -> Self {
        match err {
            bluesync_api::Error::Transport(ref e) => {
                let url = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                if e.is_timeout() {
                    CoreError::Timeout
                } else if let Some(status) = e.status() {
                    CoreError::Rejected {
                        status: status.as_u16(),
                        detail: format!("HTTP {}", status.as_u16()),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url,
                        reason: e.to_string(),
                    }
                }
            }
            bluesync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            bluesync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            bluesync_api::Error::Api { status, detail } => CoreError::Rejected { status, detail },
            bluesync_api::Error::ChannelConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel: {reason}"),
            },
            bluesync_api::Error::ChannelClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel closed (code {code}): {reason}"),
            },
            bluesync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Unexpected backend response: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_keeps_backend_detail() {
        let err = CoreError::from(bluesync_api::Error::Api {
            status: 400,
            detail: "Failed to connect: br-connection-page-timeout".into(),
        });
        assert_eq!(err.to_string(), "Failed to connect: br-connection-page-timeout");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn step_failed_names_the_step() {
        let err = CoreError::StepFailed {
            step: ActionStep::Pair,
            message: "Authentication Failed".into(),
        };
        assert_eq!(err.to_string(), "pair failed: Authentication Failed");
    }

    #[test]
    fn invalid_url_is_config_error() {
        let parse_err = url::Url::parse("not a url").err();
        let Some(parse_err) = parse_err else {
            panic!("expected parse failure");
        };
        let err = CoreError::from(bluesync_api::Error::InvalidUrl(parse_err));
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
