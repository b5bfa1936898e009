//! Live view: follow notices, registry changes and channel state until
//! interrupted.
//!
//! Table and plain output print one human-readable line per event; the
//! structured formats print one compact JSON object per line.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use owo_colors::Style;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use bluesync_core::{
    ChannelState, Engine, EngineConfig, EngineNotice, MacAddress, NoticeKind, PairedDevice,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Events ──────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent {
    Notice(EngineNotice),
    Channel { state: ChannelState },
    Paired { mac: MacAddress, name: String },
    Unpaired { mac: MacAddress, name: String },
    Connection { mac: MacAddress, name: String, connected: bool },
    Discovered { count: usize },
}

impl WatchEvent {
    fn line(&self, color: bool) -> String {
        match self {
            Self::Notice(n) => {
                let style = match n.kind {
                    NoticeKind::DeviceConnected | NoticeKind::DevicePaired => {
                        Style::new().green()
                    }
                    NoticeKind::DeviceDisconnected | NoticeKind::DeviceRemoved => {
                        Style::new().yellow()
                    }
                };
                output::paint(&n.text, style, color)
            }
            Self::Channel { state } => {
                let style = match state {
                    ChannelState::Open => Style::new().green(),
                    ChannelState::ReconnectWait => Style::new().red(),
                    _ => Style::new().dimmed(),
                };
                format!("push channel {}", output::paint(&state.to_string(), style, color))
            }
            Self::Paired { mac, name } => format!("+ {name} ({mac})"),
            Self::Unpaired { mac, name } => format!("- {name} ({mac})"),
            Self::Connection {
                mac,
                name,
                connected,
            } => {
                let what = if *connected { "connected" } else { "disconnected" };
                format!("~ {name} ({mac}) {what}")
            }
            Self::Discovered { count } => format!("{count} device(s) discovered"),
        }
    }
}

/// Changes between two paired-registry snapshots, in MAC order.
fn diff_paired(old: &[Arc<PairedDevice>], new: &[Arc<PairedDevice>]) -> Vec<WatchEvent> {
    let before: HashMap<&MacAddress, &Arc<PairedDevice>> =
        old.iter().map(|d| (&d.mac, d)).collect();
    let after: HashMap<&MacAddress, &Arc<PairedDevice>> =
        new.iter().map(|d| (&d.mac, d)).collect();

    let mut events = Vec::new();
    for d in new {
        match before.get(&d.mac) {
            None => events.push(WatchEvent::Paired {
                mac: d.mac.clone(),
                name: d.display_name().to_owned(),
            }),
            Some(prev) if prev.connected != d.connected => events.push(WatchEvent::Connection {
                mac: d.mac.clone(),
                name: d.display_name().to_owned(),
                connected: d.connected,
            }),
            Some(_) => {}
        }
    }
    for d in old {
        if !after.contains_key(&d.mac) {
            events.push(WatchEvent::Unpaired {
                mac: d.mac.clone(),
                name: d.display_name().to_owned(),
            });
        }
    }
    events
}

// ── Handler ─────────────────────────────────────────────────────────

struct Printer {
    structured: bool,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn emit(&self, event: &WatchEvent) -> Result<(), CliError> {
        let line = if self.structured {
            output::render_json(event, true)?
        } else {
            let time = Local::now().format("%H:%M:%S").to_string();
            format!(
                "{} {}",
                output::paint(&time, Style::new().dimmed(), self.color),
                event.line(self.color)
            )
        };
        output::print_output(&line, self.quiet);
        Ok(())
    }
}

pub async fn handle(
    config: EngineConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let WatchArgs { scan } = args;
    let engine = Engine::new(config)?;
    let printer = Printer {
        structured: !matches!(global.output, OutputFormat::Table | OutputFormat::Plain),
        color: output::should_color(&global.color),
        quiet: global.quiet,
    };

    let result = follow(&engine, &printer, scan).await;
    engine.shutdown().await;
    result
}

async fn follow(engine: &Engine, printer: &Printer, scan: bool) -> Result<(), CliError> {
    // Subscribe before starting so no notice is missed.
    let mut notices = engine.notices();
    let mut channel = engine.channel_state();
    let mut paired = engine.paired();
    let mut discovered = engine.discovered();

    engine.start().await?;

    let mut known = paired.latest();
    for d in known.iter() {
        printer.emit(&WatchEvent::Paired {
            mac: d.mac.clone(),
            name: d.display_name().to_owned(),
        })?;
    }

    if scan {
        engine.start_scan().await?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => break,

            notice = notices.recv() => match notice {
                Ok(n) => printer.emit(&WatchEvent::Notice(n))?,
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "notice receiver lagged"),
                Err(RecvError::Closed) => break,
            },

            changed = channel.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *channel.borrow_and_update();
                printer.emit(&WatchEvent::Channel { state })?;
            }

            Some(snap) = paired.changed() => {
                for event in diff_paired(&known, &snap) {
                    printer.emit(&event)?;
                }
                known = snap;
            }

            Some(snap) = discovered.changed() => {
                printer.emit(&WatchEvent::Discovered { count: snap.len() })?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn dev(mac: &str, name: &str, connected: bool) -> Arc<PairedDevice> {
        Arc::new(PairedDevice {
            mac: MacAddress::new(mac),
            name: Some(name.into()),
            connected,
            paired: true,
            trusted: true,
            rssi: None,
        })
    }

    #[test]
    fn diff_reports_pairing_connection_and_removal() {
        let old = vec![
            dev("00:00:00:00:00:01", "Buds", false),
            dev("00:00:00:00:00:02", "Speaker", true),
        ];
        let new = vec![
            dev("00:00:00:00:00:01", "Buds", true),
            dev("00:00:00:00:00:03", "Keyboard", false),
        ];

        let events = diff_paired(&old, &new);
        assert_eq!(
            events,
            vec![
                WatchEvent::Connection {
                    mac: MacAddress::new("00:00:00:00:00:01"),
                    name: "Buds".into(),
                    connected: true,
                },
                WatchEvent::Paired {
                    mac: MacAddress::new("00:00:00:00:00:03"),
                    name: "Keyboard".into(),
                },
                WatchEvent::Unpaired {
                    mac: MacAddress::new("00:00:00:00:00:02"),
                    name: "Speaker".into(),
                },
            ]
        );
    }

    #[test]
    fn unchanged_snapshot_has_no_events() {
        let snap = vec![dev("00:00:00:00:00:01", "Buds", true)];
        assert!(diff_paired(&snap, &snap).is_empty());
    }

    #[test]
    fn structured_event_is_tagged() {
        let json = output::render_json(&WatchEvent::Discovered { count: 2 }, true).unwrap();
        assert_eq!(json, r#"{"event":"discovered","count":2}"#);
    }
}
