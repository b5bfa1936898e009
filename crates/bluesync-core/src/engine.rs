// ── Engine ──
//
// Full lifecycle management for one backend: wires the poller, the push
// channel, the dispatcher, the scan controller and the sequencer, owns the
// background tasks and routes commands.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use bluesync_api::models::{ActionResponse, HealthStatus};
use bluesync_api::{BluetoothClient, ChannelHandle, ChannelState};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::EngineConfig;
use crate::dispatcher::{Dispatcher, EngineNotice, dispatcher_task};
use crate::error::CoreError;
use crate::model::{Adapter, DeviceDetails, DiscoveredDevice, MacAddress, PairedDevice};
use crate::poller::{PollReason, PollTrigger, Poller, poll_task};
use crate::scan::ScanController;
use crate::sequencer::Sequencer;
use crate::store::DeviceStore;
use crate::stream::RegistryStream;

const COMMAND_CHANNEL_SIZE: usize = 64;
const NOTICE_CHANNEL_SIZE: usize = 64;

// ── EngineState ──────────────────────────────────────────────────────

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EngineState {
    Idle,
    /// Claimed by one `start` call; the startup poll is in flight.
    Starting,
    Running,
    Stopped,
}

// ── Engine ───────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Consumers read the
/// [`DeviceStore`], subscribe to its registries and send [`Command`]s;
/// nothing else writes engine state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    channel_url: Url,
    client: BluetoothClient,
    store: Arc<DeviceStore>,
    poller: Arc<Poller>,
    sequencer: Sequencer,
    scan: ScanController,
    polls: PollTrigger,
    poll_rx: Mutex<Option<mpsc::Receiver<PollReason>>>,
    notice_tx: broadcast::Sender<EngineNotice>,
    state: watch::Sender<EngineState>,
    channel_state: watch::Sender<ChannelState>,
    channel: Mutex<Option<ChannelHandle>>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Build an engine. Nothing touches the network until
    /// [`start()`](Self::start).
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        let client = BluetoothClient::new(config.url.clone(), &config.transport())?;
        let channel_url = match &config.channel_url {
            Some(url) => url.clone(),
            None => bluesync_api::channel::channel_url(&config.url)?,
        };

        let store = Arc::new(DeviceStore::new());
        let cancel = CancellationToken::new();
        let poller = Arc::new(Poller::new(client.clone(), Arc::clone(&store)));
        let sequencer = Sequencer::new(client.clone(), Arc::clone(&store), Arc::clone(&poller));
        let scan = ScanController::new(
            client.clone(),
            Arc::clone(&store),
            config.scan_duration,
            cancel.child_token(),
        );
        let (polls, poll_rx) = PollTrigger::channel();
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        let (state, _) = watch::channel(EngineState::Idle);
        let (channel_state, _) = watch::channel(ChannelState::Idle);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                channel_url,
                client,
                store,
                poller,
                sequencer,
                scan,
                polls,
                poll_rx: Mutex::new(Some(poll_rx)),
                notice_tx,
                state,
                channel_state,
                channel: Mutex::new(None),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    /// Push-channel URL in use.
    pub fn channel_url(&self) -> &Url {
        &self.inner.channel_url
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Run the startup poll and spawn the background tasks.
    ///
    /// A failed startup poll is logged; the cadence and the push channel
    /// keep trying. Only one call can leave `idle`; concurrent or repeated
    /// calls fail.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.launch(false).await
    }

    async fn launch(&self, require_initial_poll: bool) -> Result<(), CoreError> {
        let mut refusal = None;
        self.inner.state.send_if_modified(|state| match *state {
            EngineState::Idle => {
                *state = EngineState::Starting;
                true
            }
            EngineState::Starting | EngineState::Running => {
                refusal = Some(CoreError::Internal("engine already started".into()));
                false
            }
            EngineState::Stopped => {
                refusal = Some(CoreError::EngineStopped);
                false
            }
        });
        if let Some(err) = refusal {
            return Err(err);
        }

        if let Err(e) = self.spawn_tasks(require_initial_poll).await {
            self.leave_starting(EngineState::Idle);
            return Err(e);
        }

        // A shutdown that raced the startup wins.
        if self.leave_starting(EngineState::Running) {
            let config = &self.inner.config;
            info!(url = %config.url, channel = config.channel_enabled, "engine started");
        }
        Ok(())
    }

    /// Move out of `Starting` unless a shutdown already did.
    fn leave_starting(&self, next: EngineState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state != EngineState::Starting {
                return false;
            }
            *state = next;
            true
        })
    }

    async fn spawn_tasks(&self, require_initial_poll: bool) -> Result<(), CoreError> {
        if require_initial_poll {
            self.inner.poller.poll_now(PollReason::Startup).await?;
        } else {
            self.inner.poller.poll_logged(PollReason::Startup).await;
        }

        let config = &self.inner.config;
        let mut handles = self.inner.task_handles.lock().await;

        if config.channel_enabled {
            let handle = ChannelHandle::connect(
                self.inner.channel_url.clone(),
                config.channel(),
                &config.transport(),
                self.inner.cancel.child_token(),
            )?;
            let dispatcher = Dispatcher::new(
                Arc::clone(&self.inner.store),
                self.inner.polls.clone(),
                self.inner.notice_tx.clone(),
            );
            handles.push(tokio::spawn(dispatcher_task(
                dispatcher,
                handle.subscribe(),
                self.inner.cancel.clone(),
            )));
            handles.push(tokio::spawn(forward_channel_state(
                handle.state_watch(),
                self.inner.channel_state.clone(),
                self.inner.cancel.clone(),
            )));
            *self.inner.channel.lock().await = Some(handle);
        }

        if let Some(rx) = self.inner.poll_rx.lock().await.take() {
            handles.push(tokio::spawn(poll_task(
                Arc::clone(&self.inner.poller),
                Arc::clone(&self.inner.store),
                config.poll_interval,
                rx,
                self.inner.cancel.clone(),
            )));
        }

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(self.clone(), rx)));
        }
        Ok(())
    }

    /// Stop everything. The push channel closes intentionally, timers and
    /// tasks are cancelled, and the store keeps its last-known contents.
    /// Later commands fail with [`CoreError::EngineStopped`].
    pub async fn shutdown(&self) {
        if self.inner.state.send_replace(EngineState::Stopped) == EngineState::Stopped {
            return;
        }

        if let Some(handle) = self.inner.channel.lock().await.take() {
            handle.disconnect_intentionally();
            handle.closed().await;
        }
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        if *self.inner.channel_state.borrow() != ChannelState::Idle {
            self.inner
                .channel_state
                .send_replace(ChannelState::ClosedIntentional);
        }
        debug!("engine stopped");
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    /// Start, run `f`, shut down. Runs without push channel or cadence,
    /// and fails early if the backend cannot be polled.
    pub async fn oneshot<F, Fut, T>(config: EngineConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Engine) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.channel_enabled = false;
        cfg.poll_interval = std::time::Duration::ZERO;

        let engine = Engine::new(cfg)?;
        engine.launch(true).await?;
        let result = f(engine.clone()).await;
        engine.shutdown().await;
        result
    }

    // ── Command execution ────────────────────────────────────────────

    /// Send a command to the command processor and await its result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.state.borrow() != EngineState::Running {
            return Err(CoreError::EngineStopped);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::EngineStopped)?;

        rx.await.map_err(|_| CoreError::EngineStopped)?
    }

    pub async fn start_scan(&self) -> Result<ActionResponse, CoreError> {
        self.execute(Command::StartScan).await?.into_action()
    }

    pub async fn stop_scan(&self) -> Result<ActionResponse, CoreError> {
        self.execute(Command::StopScan).await?.into_action()
    }

    /// Whether the backend reports an active discovery.
    pub async fn scan_status(&self) -> Result<bool, CoreError> {
        self.execute(Command::ScanStatus).await?.into_scanning()
    }

    pub async fn pair_and_connect(&self, mac: MacAddress) -> Result<ActionResponse, CoreError> {
        self.execute(Command::PairAndConnect { mac })
            .await?
            .into_action()
    }

    pub async fn connect(&self, mac: MacAddress) -> Result<ActionResponse, CoreError> {
        self.execute(Command::Connect { mac }).await?.into_action()
    }

    pub async fn disconnect(&self, mac: MacAddress) -> Result<ActionResponse, CoreError> {
        self.execute(Command::Disconnect { mac }).await?.into_action()
    }

    pub async fn remove(&self, mac: MacAddress) -> Result<ActionResponse, CoreError> {
        self.execute(Command::Remove { mac }).await?.into_action()
    }

    pub async fn trust(&self, mac: MacAddress) -> Result<DeviceDetails, CoreError> {
        self.execute(Command::Trust { mac }).await?.into_device()
    }

    pub async fn untrust(&self, mac: MacAddress) -> Result<DeviceDetails, CoreError> {
        self.execute(Command::Untrust { mac }).await?.into_device()
    }

    pub async fn device_info(&self, mac: MacAddress) -> Result<DeviceDetails, CoreError> {
        self.execute(Command::DeviceInfo { mac }).await?.into_device()
    }

    pub async fn set_power(&self, on: bool) -> Result<ActionResponse, CoreError> {
        self.execute(Command::SetPower { on }).await?.into_action()
    }

    pub async fn toggle_power(&self) -> Result<ActionResponse, CoreError> {
        self.execute(Command::TogglePower).await?.into_action()
    }

    /// Poll now, surfacing failures instead of logging them.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.execute(Command::Refresh).await.map(|_| ())
    }

    /// Queue an out-of-cadence poll without waiting for it.
    pub fn request_poll(&self) {
        self.inner.polls.request(PollReason::Manual);
    }

    /// Backend liveness. Read-only, bypasses the command queue.
    pub async fn health(&self) -> Result<HealthStatus, CoreError> {
        Ok(self.inner.client.health().await?)
    }

    // ── State observation ────────────────────────────────────────────

    /// Informational notices from push events.
    pub fn notices(&self) -> broadcast::Receiver<EngineNotice> {
        self.inner.notice_tx.subscribe()
    }

    /// Push-channel connection state.
    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.channel_state.subscribe()
    }

    pub fn discovered_snapshot(&self) -> Arc<Vec<Arc<DiscoveredDevice>>> {
        self.inner.store.discovered_snapshot()
    }

    pub fn paired_snapshot(&self) -> Arc<Vec<Arc<PairedDevice>>> {
        self.inner.store.paired_snapshot()
    }

    pub fn adapter(&self) -> Option<Arc<Adapter>> {
        self.inner.store.adapter()
    }

    pub fn discovered(&self) -> RegistryStream<DiscoveredDevice> {
        self.inner.store.subscribe_discovered()
    }

    pub fn paired(&self) -> RegistryStream<PairedDevice> {
        self.inner.store.subscribe_paired()
    }

    #[cfg(test)]
    pub(crate) fn scan_controller(&self) -> &ScanController {
        &self.inner.scan
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Mirror the channel driver's state into the engine's own watch, which
/// outlives the channel handle.
async fn forward_channel_state(
    mut rx: watch::Receiver<ChannelState>,
    tx: watch::Sender<ChannelState>,
    cancel: CancellationToken,
) {
    loop {
        let state = *rx.borrow_and_update();
        tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// Process commands one at a time, in submission order.
async fn command_processor_task(engine: Engine, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = engine.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&engine, envelope.command).await;
                if let Err(ref e) = result {
                    debug!(error = %e, "command failed");
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

async fn route_command(engine: &Engine, cmd: Command) -> Result<CommandResult, CoreError> {
    let inner = &engine.inner;
    let seq = &inner.sequencer;

    match cmd {
        Command::StartScan => inner.scan.start().await.map(CommandResult::Action),
        Command::StopScan => inner.scan.stop().await.map(CommandResult::Action),
        Command::ScanStatus => inner.scan.status().await.map(CommandResult::Scanning),

        Command::PairAndConnect { mac } => {
            seq.pair_and_connect(&mac).await.map(CommandResult::Action)
        }
        Command::Connect { mac } => seq.connect(&mac).await.map(CommandResult::Action),
        Command::Disconnect { mac } => seq.disconnect(&mac).await.map(CommandResult::Action),
        Command::Remove { mac } => seq.remove(&mac).await.map(CommandResult::Action),
        Command::Trust { mac } => seq.trust(&mac).await.map(CommandResult::Device),
        Command::Untrust { mac } => seq.untrust(&mac).await.map(CommandResult::Device),
        Command::DeviceInfo { mac } => seq.device_info(&mac).await.map(CommandResult::Device),

        Command::SetPower { on } => seq.set_power(on).await.map(CommandResult::Action),
        Command::TogglePower => seq.toggle_power().await.map(CommandResult::Action),

        Command::Refresh => {
            let result = inner.poller.poll_now(PollReason::Manual).await;
            if let Err(ref e) = result {
                warn!(error = %e, "manual refresh failed");
            }
            result.map(|()| CommandResult::Refreshed)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn mount_empty_backend(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": [] })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/adapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "adapters": [] })))
            .mount(server)
            .await;
    }

    fn quiet_config(server: &MockServer) -> EngineConfig {
        let mut config = EngineConfig::new(Url::parse(&server.uri()).unwrap());
        config.channel_enabled = false;
        config.poll_interval = Duration::ZERO;
        config
    }

    #[test]
    fn channel_url_is_derived_from_base() {
        let config =
            EngineConfig::new(Url::parse("https://ha.local/api/hassio_ingress/tok/").unwrap());
        let engine = Engine::new(config).unwrap();
        assert_eq!(
            engine.channel_url().as_str(),
            "wss://ha.local/api/hassio_ingress/tok/ws/scan"
        );
    }

    #[tokio::test]
    async fn commands_before_start_are_rejected() {
        let server = MockServer::start().await;
        let engine = Engine::new(quiet_config(&server)).unwrap();

        let err = engine.start_scan().await.unwrap_err();
        assert!(matches!(err, CoreError::EngineStopped));
    }

    #[tokio::test]
    async fn shutdown_keeps_store_and_rejects_commands() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": [
                { "mac": "AA:BB:CC:DD:EE:01", "paired": true }
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/adapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "adapters": [] })))
            .mount(&server)
            .await;

        let engine = Engine::new(quiet_config(&server)).unwrap();
        engine.start().await.unwrap();
        assert_eq!(engine.paired_snapshot().len(), 1);

        engine.shutdown().await;

        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(engine.paired_snapshot().len(), 1);
        assert!(matches!(
            engine.refresh().await.unwrap_err(),
            CoreError::EngineStopped
        ));
        assert!(matches!(
            engine.start().await.unwrap_err(),
            CoreError::EngineStopped
        ));
    }

    #[tokio::test]
    async fn shutdown_cancels_scan_timer() {
        let server = MockServer::start().await;
        mount_empty_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/scan/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/scan/stop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = quiet_config(&server);
        config.scan_duration = Duration::from_millis(100);
        let engine = Engine::new(config).unwrap();
        engine.start().await.unwrap();
        engine.start_scan().await.unwrap();
        assert_eq!(engine.scan_controller().armed_timers().await, 1);

        engine.shutdown().await;
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    #[tokio::test]
    async fn concurrent_starts_launch_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "devices": [] }))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/adapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "adapters": [] })))
            .mount(&server)
            .await;

        let engine = Engine::new(quiet_config(&server)).unwrap();
        let (first, second) = tokio::join!(engine.start(), engine.start());

        assert_eq!(
            usize::from(first.is_ok()) + usize::from(second.is_ok()),
            1,
            "exactly one start may win: {first:?} / {second:?}"
        );
        let loser = first.err().or(second.err()).unwrap();
        assert!(matches!(loser, CoreError::Internal(ref msg) if msg.contains("already started")));
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.inner.task_handles.lock().await.len(), 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn failed_oneshot_start_returns_to_idle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/adapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "adapters": [] })))
            .mount(&server)
            .await;

        let engine = Engine::new(quiet_config(&server)).unwrap();
        assert!(engine.launch(true).await.is_err());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn oneshot_surfaces_unreachable_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/adapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "adapters": [] })))
            .mount(&server)
            .await;

        let config = EngineConfig::new(Url::parse(&server.uri()).unwrap());
        let err = Engine::oneshot(config, |_engine| async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
    }
}
