//! Command dispatch: bridges CLI args -> engine operations -> output formatting.

pub mod actions;
pub mod adapter;
pub mod config_cmd;
pub mod devices;
pub mod health;
pub mod scan;
pub mod util;
pub mod watch;

use bluesync_core::EngineConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: EngineConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Devices => devices::list(config, global).await,
        Command::Scan(args) => scan::handle(config, args, global).await,
        Command::Info(args) => devices::info(config, args, global).await,
        Command::Pair(args) => actions::pair(config, args, global).await,
        Command::Connect(args) => actions::connect(config, args, global).await,
        Command::Disconnect(args) => actions::disconnect(config, args, global).await,
        Command::Remove(args) => actions::remove(config, args, global).await,
        Command::Trust(args) => actions::trust(config, args, global, true).await,
        Command::Untrust(args) => actions::trust(config, args, global, false).await,
        Command::Power(args) => adapter::power(config, args, global).await,
        Command::Adapter => adapter::show(config, global).await,
        Command::Health => health::handle(config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "local command routed to backend dispatch".into(),
        }),
    }
}
