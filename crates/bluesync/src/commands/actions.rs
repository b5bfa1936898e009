//! Device action handlers: pair, connect, disconnect, remove, trust.

use bluesync_core::{ActionResponse, CoreError, Engine, EngineConfig, MacAddress};

use crate::cli::{GlobalOpts, MacArgs};
use crate::error::CliError;
use crate::output;

use super::{devices, util};

/// Run one device action inside a short-lived engine.
async fn run_action<F, Fut, T>(
    config: EngineConfig,
    mac: &MacAddress,
    action: F,
) -> Result<T, CliError>
where
    F: FnOnce(Engine, MacAddress) -> Fut,
    Fut: std::future::Future<Output = Result<T, CoreError>>,
{
    let target = mac.clone();
    Engine::oneshot(config, move |engine| action(engine, target))
        .await
        .map_err(util::device_error(mac))
}

/// Print the backend's message, or `fallback` when it sent none.
fn report(resp: &ActionResponse, fallback: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        resp,
        |r| r.message.clone().unwrap_or_else(|| fallback.to_owned()),
        |r| r.success.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn pair(config: EngineConfig, args: MacArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let MacArgs { mac } = args;
    let mac = util::parse_mac(&mac)?;
    tracing::info!(%mac, "pairing");
    let resp = run_action(config, &mac, |engine, mac| async move {
        engine.pair_and_connect(mac).await
    })
    .await?;
    report(&resp, &format!("Paired and connected {mac}"), global)
}

pub async fn connect(
    config: EngineConfig,
    args: MacArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let MacArgs { mac } = args;
    let mac = util::parse_mac(&mac)?;
    let resp = run_action(config, &mac, |engine, mac| async move {
        engine.connect(mac).await
    })
    .await?;
    report(&resp, &format!("Connected {mac}"), global)
}

pub async fn disconnect(
    config: EngineConfig,
    args: MacArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let MacArgs { mac } = args;
    let mac = util::parse_mac(&mac)?;
    let resp = run_action(config, &mac, |engine, mac| async move {
        engine.disconnect(mac).await
    })
    .await?;
    report(&resp, &format!("Disconnected {mac}"), global)
}

pub async fn remove(
    config: EngineConfig,
    args: MacArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let MacArgs { mac } = args;
    let mac = util::parse_mac(&mac)?;
    if !util::confirm(
        &format!("Remove {mac}? It will have to be paired again."),
        global.yes,
        "remove",
    )? {
        return Ok(());
    }
    let resp = run_action(config, &mac, |engine, mac| async move {
        engine.remove(mac).await
    })
    .await?;
    report(&resp, &format!("Removed {mac}"), global)
}

/// `trust` and `untrust`; both print the device as read back afterwards.
pub async fn trust(
    config: EngineConfig,
    args: MacArgs,
    global: &GlobalOpts,
    trusted: bool,
) -> Result<(), CliError> {
    let MacArgs { mac } = args;
    let mac = util::parse_mac(&mac)?;
    let details = run_action(config, &mac, move |engine, mac| async move {
        if trusted {
            engine.trust(mac).await
        } else {
            engine.untrust(mac).await
        }
    })
    .await?;

    let out = output::render_single(&global.output, &details, devices::detail, |d| {
        d.mac.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
