//! Reconnecting push channel.
//!
//! Connects to the backend's `/ws/scan` websocket and streams parsed
//! [`InboundMessage`]s through a [`tokio::sync::broadcast`] channel. The
//! connection lifecycle is driven by [`ChannelMachine`]: a close that was
//! not requested arms a single fixed-delay reconnect, and an explicit
//! [`ChannelHandle::disconnect_intentionally`] ends the loop for good.
//!
//! # Example
//!
//! ```rust,ignore
//! use bluesync_api::channel::{ChannelConfig, ChannelHandle};
//! use bluesync_api::TransportConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! let url = bluesync_api::channel::channel_url(&"http://pi.local:8099".parse()?)?;
//! let handle = ChannelHandle::connect(
//!     url,
//!     ChannelConfig::default(),
//!     &TransportConfig::default(),
//!     CancellationToken::new(),
//! )?;
//! let mut rx = handle.subscribe();
//! while let Ok(msg) = rx.recv().await {
//!     println!("{msg:?}");
//! }
//! ```

mod machine;
mod message;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, tungstenite};
use tokio_util::sync::CancellationToken;
use url::Url;

pub use machine::{ChannelMachine, ChannelState};
pub use message::InboundMessage;

use crate::error::Error;
use crate::transport::TransportConfig;

const MESSAGE_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fixed suffix of the push endpoint, appended to the base path.
const CHANNEL_PATH: &str = "/ws/scan";

/// Text frame the backend answers with `{"type":"pong"}`.
const KEEPALIVE_PAYLOAD: &str = "ping";

// ── ChannelConfig ────────────────────────────────────────────────────

/// Timing of the push channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Delay between a close and the next connection attempt. Default: 5s.
    pub reconnect_delay: Duration,
    /// Interval of the `ping` keepalive while open; zero disables it.
    /// Default: 30s.
    pub keepalive_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// Derive the push-channel URL from the backend base URL.
///
/// A trailing `/` and `/index.html` are stripped, `http` maps to `ws` and
/// `https` to `wss`, then `/ws/scan` is appended.
pub fn channel_url(base: &Url) -> Result<Url, Error> {
    let mut base = base.clone();
    base.set_query(None);
    base.set_fragment(None);

    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::ChannelConnect(format!(
                "unsupported URL scheme for push channel: {other}"
            )));
        }
    };

    let raw = base.as_str();
    let rest = raw.strip_prefix(base.scheme()).unwrap_or(raw);
    let mut rest = rest.trim_end_matches('/');
    if let Some(stripped) = rest.strip_suffix("/index.html") {
        rest = stripped.trim_end_matches('/');
    }

    Ok(Url::parse(&format!("{scheme}{rest}{CHANNEL_PATH}"))?)
}

// ── ChannelHandle ────────────────────────────────────────────────────

/// Handle to a running push channel.
pub struct ChannelHandle {
    message_tx: broadcast::Sender<Arc<InboundMessage>>,
    state_rx: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first attempt happens in the background; subscribe before
    /// awaiting anything to see every message. Cancelling `cancel` has the
    /// same effect as [`disconnect_intentionally`](Self::disconnect_intentionally).
    pub fn connect(
        url: Url,
        config: ChannelConfig,
        transport: &TransportConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let connector = transport.channel_connector()?;
        let (message_tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);

        let driver = Driver {
            url,
            config,
            connector,
            message_tx: message_tx.clone(),
            state_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        Ok(Self {
            message_tx,
            state_rx,
            cancel,
        })
    }

    /// New receiver for inbound messages. A slow receiver gets
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.message_tx.subscribe()
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Watch connection state transitions.
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Close the connection and stop reconnecting. Terminal.
    pub fn disconnect_intentionally(&self) {
        self.cancel.cancel();
    }

    /// Wait until the loop has reached `closed-intentional`.
    pub async fn closed(&self) {
        let mut rx = self.state_rx.clone();
        // Err means the driver is gone, which only happens after shutdown.
        let _ = rx
            .wait_for(|s| *s == ChannelState::ClosedIntentional)
            .await;
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// How an open connection ended.
enum OpenOutcome {
    Cancelled,
    Closed(Option<Error>),
}

struct Driver {
    url: Url,
    config: ChannelConfig,
    connector: Option<Connector>,
    message_tx: broadcast::Sender<Arc<InboundMessage>>,
    state_tx: watch::Sender<ChannelState>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self) {
        let mut machine = ChannelMachine::new(self.config.reconnect_delay);

        loop {
            if !machine.begin_connect() {
                break;
            }
            self.publish(&machine);
            tracing::info!(url = %self.url, "connecting push channel");

            let attempt = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.open() => result,
            };

            match attempt {
                Ok(ws) => {
                    if !machine.on_open() {
                        break;
                    }
                    self.publish(&machine);
                    tracing::info!("push channel open");

                    match self.read_until_closed(ws).await {
                        OpenOutcome::Cancelled => break,
                        OpenOutcome::Closed(None) => {
                            tracing::info!("push channel closed by server");
                        }
                        OpenOutcome::Closed(Some(e)) => {
                            tracing::warn!(error = %e, "push channel dropped");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "push channel connection failed");
                }
            }

            machine.on_close(Instant::now());
            self.publish(&machine);

            let Some(deadline) = machine.reconnect_deadline() else {
                break;
            };
            tracing::info!(
                delay_ms = u64::try_from(self.config.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
                "waiting before reconnect"
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep_until(deadline) => {}
            }
        }

        machine.shutdown();
        self.publish(&machine);
        tracing::debug!("push channel loop exiting");
    }

    fn publish(&self, machine: &ChannelMachine) {
        self.state_tx.send_replace(machine.state());
    }

    async fn open(&self) -> Result<WsStream, Error> {
        let (ws, _response) = tokio_tungstenite::connect_async_tls_with_config(
            self.url.as_str(),
            None,
            false,
            self.connector.clone(),
        )
        .await
        .map_err(|e| Error::ChannelConnect(e.to_string()))?;
        Ok(ws)
    }

    /// Read frames and send keepalives until the connection ends. A zero
    /// keepalive interval sends none.
    async fn read_until_closed(&self, ws: WsStream) -> OpenOutcome {
        let (mut write, mut read) = ws.split();

        let period = self.config.keepalive_interval;
        let mut keepalive = (!period.is_zero()).then(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return OpenOutcome::Cancelled;
                }
                () = next_keepalive(keepalive.as_mut()) => {
                    tracing::trace!("sending keepalive");
                    if let Err(e) = write.send(tungstenite::Message::Text(KEEPALIVE_PAYLOAD.into())).await {
                        return OpenOutcome::Closed(Some(Error::ChannelConnect(e.to_string())));
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(msg) = InboundMessage::parse(text.as_str()) {
                            // No subscribers is fine.
                            let _ = self.message_tx.send(Arc::new(msg));
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return OpenOutcome::Closed(frame.map(|cf| Error::ChannelClosed {
                            code: u16::from(cf.code),
                            reason: cf.reason.as_str().to_owned(),
                        }));
                    }
                    Some(Err(e)) => {
                        return OpenOutcome::Closed(Some(Error::ChannelConnect(e.to_string())));
                    }
                    None => return OpenOutcome::Closed(None),
                    // Binary, Ping, Pong, Frame: tungstenite answers pings itself
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

/// Next keepalive tick, or never when keepalives are off.
async fn next_keepalive(keepalive: Option<&mut Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn channel_url_maps_http_to_ws() {
        assert_eq!(
            channel_url(&url("http://pi.local:8099")).unwrap().as_str(),
            "ws://pi.local:8099/ws/scan"
        );
    }

    #[test]
    fn channel_url_maps_https_to_wss_and_keeps_prefix() {
        assert_eq!(
            channel_url(&url("https://ha.example.com/api/hassio_ingress/tok/"))
                .unwrap()
                .as_str(),
            "wss://ha.example.com/api/hassio_ingress/tok/ws/scan"
        );
    }

    #[test]
    fn channel_url_strips_index_html() {
        assert_eq!(
            channel_url(&url("http://host:8099/addon/index.html"))
                .unwrap()
                .as_str(),
            "ws://host:8099/addon/ws/scan"
        );
        assert_eq!(
            channel_url(&url("http://host:8099/index.html?x=1"))
                .unwrap()
                .as_str(),
            "ws://host:8099/ws/scan"
        );
    }

    #[test]
    fn channel_url_rejects_other_schemes() {
        assert!(matches!(
            channel_url(&url("ftp://host/")),
            Err(Error::ChannelConnect(_))
        ));
    }

    #[test]
    fn default_timings() {
        let config = ChannelConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
    }
}
