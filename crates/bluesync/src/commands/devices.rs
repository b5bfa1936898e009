//! Paired-device listing and device detail.

use std::sync::Arc;

use tabled::Tabled;

use bluesync_core::{DeviceDetails, Engine, EngineConfig, PairedDevice};

use crate::cli::{GlobalOpts, MacArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PairedRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Connected")]
    connected: String,
    #[tabled(rename = "Trusted")]
    trusted: String,
    #[tabled(rename = "Signal")]
    signal: String,
}

impl PairedRow {
    fn new(d: &Arc<PairedDevice>, color: bool) -> Self {
        Self {
            mac: d.mac.to_string(),
            name: d.name.clone().unwrap_or_default(),
            connected: output::flag(d.connected),
            trusted: output::flag(d.trusted),
            signal: output::signal_label(d.signal_quality(), color),
        }
    }
}

/// Multi-line detail view shared by `info`, `trust` and `untrust`.
pub(super) fn detail(d: &DeviceDetails) -> String {
    let mut lines = vec![
        format!("MAC:        {}", d.mac),
        format!("Name:       {}", d.name.as_deref().unwrap_or("-")),
        format!("Alias:      {}", d.alias.as_deref().unwrap_or("-")),
        format!("Paired:     {}", output::flag(d.paired)),
        format!("Bonded:     {}", output::flag(d.bonded)),
        format!("Trusted:    {}", output::flag(d.trusted)),
        format!("Blocked:    {}", output::flag(d.blocked)),
        format!("Connected:  {}", output::flag(d.connected)),
        format!(
            "RSSI:       {}",
            d.rssi.map_or_else(|| "-".into(), |r| format!("{r} dBm"))
        ),
    ];
    if let Some(battery) = d.battery {
        lines.push(format!("Battery:    {battery}%"));
    }
    if let Some(class) = &d.class {
        lines.push(format!("Class:      {class}"));
    }
    if let Some(icon) = &d.icon {
        lines.push(format!("Icon:       {icon}"));
    }
    if !d.services.is_empty() {
        lines.push("Services:".into());
        for svc in &d.services {
            match &svc.uuid {
                Some(uuid) => lines.push(format!("  {} ({uuid})", svc.name)),
                None => lines.push(format!("  {}", svc.name)),
            }
        }
    }
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(config: EngineConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let paired = Engine::oneshot(config, |engine| async move {
        Ok(engine.paired_snapshot())
    })
    .await?;

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        paired.as_slice(),
        |d| PairedRow::new(d, color),
        |d| d.mac.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn info(config: EngineConfig, args: MacArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let MacArgs { mac } = args;
    let mac = util::parse_mac(&mac)?;
    let details = Engine::oneshot(config, |engine| {
        let mac = mac.clone();
        async move { engine.device_info(mac).await }
    })
    .await
    .map_err(util::device_error(&mac))?;

    let out = output::render_single(&global.output, &details, detail, |d| d.mac.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
