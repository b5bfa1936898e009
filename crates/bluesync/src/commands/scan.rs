//! Discovery scan: run one bounded scan session and list what it found.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use bluesync_core::{DiscoveredDevice, Engine, EngineConfig, sort_by_signal};

use crate::cli::{GlobalOpts, ScanArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DiscoveredRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "RSSI")]
    rssi: String,
    #[tabled(rename = "Audio")]
    audio: String,
}

impl DiscoveredRow {
    fn new(d: &Arc<DiscoveredDevice>, color: bool) -> Self {
        Self {
            mac: d.mac.to_string(),
            name: d.display_name().to_owned(),
            signal: output::signal_label(d.signal_quality(), color),
            rssi: d.rssi.map(|r| r.to_string()).unwrap_or_default(),
            audio: output::flag(d.is_audio()),
        }
    }
}

fn spinner(global: &GlobalOpts) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub async fn handle(
    mut config: EngineConfig,
    args: ScanArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ScanArgs {
        audio_only,
        duration,
    } = args;
    if let Some(secs) = duration {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "duration".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        config.scan_duration = Duration::from_secs(secs);
    }
    // Discovery is push-only, so the polling cadence is not needed here.
    config.poll_interval = Duration::ZERO;

    let engine = Engine::new(config)?;
    engine.start().await?;
    let scanned = run_scan(&engine, global).await;
    engine.shutdown().await;
    let mut found = scanned?;

    sort_by_signal(&mut found);
    if audio_only {
        found.retain(|d| d.is_audio());
    }

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &found,
        |d| DiscoveredRow::new(d, color),
        |d| d.mac.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Start a session and wait until it auto-stops or the user interrupts.
async fn run_scan(
    engine: &Engine,
    global: &GlobalOpts,
) -> Result<Vec<Arc<DiscoveredDevice>>, CliError> {
    let mut session = engine.store().subscribe_scan();
    let mut discovered = engine.discovered();

    engine.start_scan().await?;
    let bar = spinner(global);
    bar.set_message("Scanning... 0 found");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() || !session.borrow_and_update().active {
                    break;
                }
            }
            Some(snap) = discovered.changed() => {
                bar.set_message(format!("Scanning... {} found", snap.len()));
            }
            _ = &mut ctrl_c => {
                bar.set_message("Stopping...");
                engine.stop_scan().await?;
                break;
            }
        }
    }
    bar.finish_and_clear();

    Ok(engine.discovered_snapshot().as_ref().clone())
}
