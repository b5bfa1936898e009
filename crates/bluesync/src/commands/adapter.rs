//! Adapter state and power handlers.

use bluesync_core::{Adapter, Engine, EngineConfig};

use crate::cli::{GlobalOpts, PowerArgs, PowerState};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(a: &Adapter) -> String {
    [
        format!("ID:           {}", a.id),
        format!("Name:         {}", a.name),
        format!(
            "MAC:          {}",
            a.mac.as_ref().map_or_else(|| "-".into(), ToString::to_string)
        ),
        format!("Powered:      {}", output::flag(a.powered)),
        format!("Discoverable: {}", output::flag(a.discoverable)),
        format!("Pairable:     {}", output::flag(a.pairable)),
        format!("Discovering:  {}", output::flag(a.discovering)),
    ]
    .join("\n")
}

pub async fn show(config: EngineConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let adapter = Engine::oneshot(config, |engine| async move { Ok(engine.adapter()) })
        .await?
        .ok_or(CliError::NoAdapter)?;

    let out = output::render_single(&global.output, adapter.as_ref(), detail, |a| a.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn power(
    config: EngineConfig,
    args: PowerArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let PowerArgs { state } = args;
    if matches!(state, PowerState::Off)
        && !util::confirm(
            "Power the adapter off? Connected devices will drop.",
            global.yes,
            "power off",
        )?
    {
        return Ok(());
    }

    let (resp, adapter) = Engine::oneshot(config, |engine| async move {
        let resp = match state {
            PowerState::On => engine.set_power(true).await?,
            PowerState::Off => engine.set_power(false).await?,
            PowerState::Toggle => engine.toggle_power().await?,
        };
        Ok((resp, engine.adapter()))
    })
    .await?;

    let fallback = adapter.map_or_else(
        || "Power request sent".to_owned(),
        |a| format!("{} is {}", a.name, if a.powered { "on" } else { "off" }),
    );
    let out = output::render_single(
        &global.output,
        &resp,
        |r| r.message.clone().unwrap_or_else(|| fallback.clone()),
        |r| r.success.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
