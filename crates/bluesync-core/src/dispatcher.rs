// ── Push event dispatcher ──
//
// Maps inbound channel messages to store mutations and poll requests.
// One task, arrival order. Discovery traffic is applied directly; anything
// that affects the paired set only triggers a poll.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use bluesync_api::InboundMessage;

use crate::model::{DiscoveredDevice, MacAddress};
use crate::poller::{PollReason, PollTrigger};
use crate::store::DeviceStore;

// ── EngineNotice ─────────────────────────────────────────────────────

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoticeKind {
    DeviceConnected,
    DeviceDisconnected,
    DevicePaired,
    DeviceRemoved,
}

/// Informational message for the consumer, e.g. "Connected to Buds".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineNotice {
    pub kind: NoticeKind,
    pub mac: Option<MacAddress>,
    pub text: String,
}

impl EngineNotice {
    fn new(kind: NoticeKind, mac: Option<&str>, text: String) -> Self {
        Self {
            kind,
            mac: mac.map(MacAddress::new),
            text,
        }
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

pub(crate) struct Dispatcher {
    store: Arc<DeviceStore>,
    polls: PollTrigger,
    notices: broadcast::Sender<EngineNotice>,
}

impl Dispatcher {
    pub(crate) fn new(
        store: Arc<DeviceStore>,
        polls: PollTrigger,
        notices: broadcast::Sender<EngineNotice>,
    ) -> Self {
        Self {
            store,
            polls,
            notices,
        }
    }

    /// Apply one message.
    pub(crate) fn dispatch(&self, msg: &InboundMessage) {
        match msg {
            InboundMessage::Discovered {
                mac,
                name,
                discovered_at,
            } => {
                let device =
                    DiscoveredDevice::from_event(mac, name.clone(), discovered_at.as_deref());
                trace!(mac = %device.mac, "device discovered");
                self.store.discovered.upsert(device.mac.clone(), device);
            }
            InboundMessage::RssiUpdate { mac, rssi } => {
                let mac = MacAddress::new(mac);
                let rssi = *rssi;
                if !self.store.discovered.modify(&mac, |d| d.rssi = rssi) {
                    trace!(%mac, "signal update for unknown device ignored");
                }
            }
            InboundMessage::DeviceConnected { mac, name, .. } => {
                let who = name
                    .as_deref()
                    .or(mac.as_deref())
                    .unwrap_or("device");
                self.notify(
                    NoticeKind::DeviceConnected,
                    mac.as_deref(),
                    format!("Connected to {who}"),
                );
                self.polls.request(PollReason::PushEvent);
            }
            InboundMessage::DeviceDisconnected { mac, .. } => {
                self.notify(
                    NoticeKind::DeviceDisconnected,
                    mac.as_deref(),
                    "Device disconnected".into(),
                );
                self.polls.request(PollReason::PushEvent);
            }
            InboundMessage::DevicePaired { mac, message, .. } => {
                self.notify(
                    NoticeKind::DevicePaired,
                    mac.as_deref(),
                    message.clone().unwrap_or_else(|| "Device paired".into()),
                );
                self.polls.request(PollReason::PushEvent);
            }
            InboundMessage::DeviceRemoved { mac, message } => {
                self.notify(
                    NoticeKind::DeviceRemoved,
                    mac.as_deref(),
                    message.clone().unwrap_or_else(|| "Device removed".into()),
                );
                self.polls.request(PollReason::PushEvent);
            }
            InboundMessage::Pong => trace!("keepalive acknowledged"),
            InboundMessage::Unknown => debug!("ignoring unrecognized channel message"),
        }
    }

    fn notify(&self, kind: NoticeKind, mac: Option<&str>, text: String) {
        // No subscribers is fine.
        let _ = self.notices.send(EngineNotice::new(kind, mac, text));
    }
}

/// Drain the channel subscription in arrival order.
pub(crate) async fn dispatcher_task(
    dispatcher: Dispatcher,
    mut rx: broadcast::Receiver<Arc<InboundMessage>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(msg) => dispatcher.dispatch(&msg),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dispatcher lagged behind push channel, reconciling");
                    dispatcher.polls.request(PollReason::Lagged);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
