//! Shared helpers for command handlers.

use std::io::IsTerminal;

use bluesync_core::{CoreError, MacAddress};

use crate::error::CliError;

/// Parse and normalize a MAC argument.
pub fn parse_mac(raw: &str) -> Result<MacAddress, CliError> {
    let mac = MacAddress::new(raw);
    if mac.is_well_formed() {
        Ok(mac)
    } else {
        Err(CliError::Validation {
            field: "mac".into(),
            reason: format!("'{raw}' is not a MAC address"),
        })
    }
}

/// Translate an engine error for a device-specific command; a 404 from
/// the backend becomes a not-found error naming the device.
pub fn device_error(mac: &MacAddress) -> impl FnOnce(CoreError) -> CliError + '_ {
    move |err| match err.status() {
        Some(404) => CliError::NotFound {
            resource_type: "device".into(),
            identifier: mac.to_string(),
            list_command: "devices".into(),
        },
        _ => err.into(),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool, action: &str) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}
