// ── Command API ──
//
// Every consumer-initiated operation flows through `Command`. The engine's
// command processor routes each variant to the scan controller, the
// sequencer or the poller.

use bluesync_api::models::ActionResponse;

use crate::error::CoreError;
use crate::model::{DeviceDetails, MacAddress};

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All operations a consumer can ask the engine to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Scanning ─────────────────────────────────────────────────────
    StartScan,
    StopScan,
    ScanStatus,

    // ── Device workflows ─────────────────────────────────────────────
    PairAndConnect { mac: MacAddress },
    Connect { mac: MacAddress },
    Disconnect { mac: MacAddress },
    Remove { mac: MacAddress },
    Trust { mac: MacAddress },
    Untrust { mac: MacAddress },
    DeviceInfo { mac: MacAddress },

    // ── Adapter ──────────────────────────────────────────────────────
    SetPower { on: bool },
    TogglePower,

    /// Run a snapshot poll now and report its outcome.
    Refresh,
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Backend acknowledgement for a state-changing call.
    Action(ActionResponse),
    Device(DeviceDetails),
    Scanning(bool),
    Refreshed,
}

impl CommandResult {
    pub(crate) fn into_action(self) -> Result<ActionResponse, CoreError> {
        match self {
            Self::Action(response) => Ok(response),
            other => Err(unexpected("action", &other)),
        }
    }

    pub(crate) fn into_device(self) -> Result<DeviceDetails, CoreError> {
        match self {
            Self::Device(details) => Ok(details),
            other => Err(unexpected("device", &other)),
        }
    }

    pub(crate) fn into_scanning(self) -> Result<bool, CoreError> {
        match self {
            Self::Scanning(scanning) => Ok(scanning),
            other => Err(unexpected("scan status", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &CommandResult) -> CoreError {
    CoreError::Internal(format!("expected {wanted} result, got {got:?}"))
}
