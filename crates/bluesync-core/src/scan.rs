// ── Scan session controller ──
//
// Bounded discovery sessions. Each start clears the discovered registry
// and arms one auto-stop timer; a restart supersedes the previous timer.
// The session lock is held across the backend call so start/stop never
// interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bluesync_api::BluetoothClient;
use bluesync_api::models::ActionResponse;

use crate::error::CoreError;
use crate::model::ScanSession;
use crate::store::DeviceStore;

/// An armed auto-stop timer, tagged with the session it belongs to.
struct AutoStop {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SessionSlot {
    generation: u64,
    timer: Option<AutoStop>,
}

impl SessionSlot {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
        }
    }
}

struct ScanInner {
    client: BluetoothClient,
    store: Arc<DeviceStore>,
    duration: Duration,
    slot: Mutex<SessionSlot>,
    /// Parent of every auto-stop token; cancelled on engine shutdown.
    cancel: CancellationToken,
}

#[derive(Clone)]
pub(crate) struct ScanController {
    inner: Arc<ScanInner>,
}

impl ScanController {
    pub(crate) fn new(
        client: BluetoothClient,
        store: Arc<DeviceStore>,
        duration: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ScanInner {
                client,
                store,
                duration,
                slot: Mutex::new(SessionSlot::default()),
                cancel,
            }),
        }
    }

    /// Start (or restart) a scan session.
    ///
    /// On backend failure nothing changes: the previous session, its
    /// timer and the discovered registry stay as they were.
    pub(crate) async fn start(&self) -> Result<ActionResponse, CoreError> {
        let mut slot = self.inner.slot.lock().await;
        let response = self.inner.client.start_scan().await?;

        let now = Instant::now();
        self.inner.discovered_reset();
        self.inner
            .store
            .set_scan(ScanSession::started(now, self.inner.duration));

        slot.disarm();
        slot.generation += 1;
        let generation = slot.generation;
        let cancel = self.inner.cancel.child_token();
        slot.timer = Some(AutoStop {
            generation,
            cancel: cancel.clone(),
        });
        drop(slot);

        info!(generation, duration = ?self.inner.duration, "scan started");
        tokio::spawn(auto_stop(self.clone(), generation, cancel));
        Ok(response)
    }

    /// Stop the current session. The session ends locally whatever the
    /// backend says.
    pub(crate) async fn stop(&self) -> Result<ActionResponse, CoreError> {
        let mut slot = self.inner.slot.lock().await;
        self.inner.finish(&mut slot).await
    }

    /// Ask the backend whether it is discovering.
    pub(crate) async fn status(&self) -> Result<bool, CoreError> {
        Ok(self.inner.client.scan_status().await?.scanning)
    }

    /// Number of armed auto-stop timers (zero or one).
    pub(crate) async fn armed_timers(&self) -> usize {
        usize::from(self.inner.slot.lock().await.timer.is_some())
    }

    /// Called when the timer for `generation` fires.
    async fn expire(&self, generation: u64) {
        let mut slot = self.inner.slot.lock().await;
        let current = slot.timer.as_ref().map(|t| t.generation);
        if current != Some(generation) {
            debug!(generation, ?current, "stale auto-stop ignored");
            return;
        }
        info!(generation, "scan duration elapsed, stopping");
        if let Err(e) = self.inner.finish(&mut slot).await {
            warn!(error = %e, "auto-stop request failed, session ended locally");
        }
    }
}

impl ScanInner {
    fn discovered_reset(&self) {
        let dropped = self.store.discovered.len();
        self.store.discovered.clear();
        debug!(dropped, "discovered registry cleared");
    }

    async fn finish(&self, slot: &mut SessionSlot) -> Result<ActionResponse, CoreError> {
        let result = self.client.stop_scan().await;
        self.store.set_scan(ScanSession::inactive());
        slot.disarm();
        result.map_err(CoreError::from)
    }
}

async fn auto_stop(controller: ScanController, generation: u64, cancel: CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(controller.inner.duration) => {
            controller.expire(generation).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::model::{DiscoveredDevice, MacAddress};

    async fn setup(duration: Duration) -> (MockServer, Arc<DeviceStore>, ScanController) {
        let server = MockServer::start().await;
        let client = BluetoothClient::new(
            Url::parse(&server.uri()).unwrap(),
            &bluesync_api::TransportConfig::default(),
        )
        .unwrap();
        let store = Arc::new(DeviceStore::new());
        let scan = ScanController::new(
            client,
            Arc::clone(&store),
            duration,
            CancellationToken::new(),
        );
        (server, store, scan)
    }

    async fn mount_ok(server: &MockServer, route: &str) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "message": "ok" })),
            )
            .mount(server)
            .await;
    }

    fn seed(store: &DeviceStore, mac: &str) {
        let mac = MacAddress::new(mac);
        store.discovered.upsert(
            mac.clone(),
            DiscoveredDevice {
                mac,
                name: None,
                discovered_at: Utc::now(),
                rssi: Some(-55),
            },
        );
    }

    #[tokio::test]
    async fn rapid_restart_clears_registry_and_keeps_one_timer() {
        let (server, store, scan) = setup(Duration::from_secs(30)).await;
        mount_ok(&server, "/api/scan/start").await;

        scan.start().await.unwrap();
        seed(&store, "AA:AA:AA:AA:AA:01");
        seed(&store, "BB:BB:BB:BB:BB:02");
        assert_eq!(store.discovered_count(), 2);

        scan.start().await.unwrap();

        assert_eq!(store.discovered_count(), 0);
        assert_eq!(scan.armed_timers().await, 1);
        assert!(store.scan_active());
    }

    #[tokio::test]
    async fn failed_start_changes_nothing() {
        let (server, store, scan) = setup(Duration::from_secs(30)).await;
        Mock::given(method("POST"))
            .and(path("/api/scan/start"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "detail": "No adapter" })),
            )
            .mount(&server)
            .await;
        seed(&store, "AA:AA:AA:AA:AA:01");

        let err = scan.start().await.unwrap_err();

        assert_eq!(err.to_string(), "No adapter");
        assert_eq!(store.discovered_count(), 1);
        assert!(!store.scan_active());
        assert_eq!(scan.armed_timers().await, 0);
    }

    #[tokio::test]
    async fn stop_ends_session_even_when_backend_fails() {
        let (server, store, scan) = setup(Duration::from_secs(30)).await;
        mount_ok(&server, "/api/scan/start").await;
        Mock::given(method("POST"))
            .and(path("/api/scan/stop"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        scan.start().await.unwrap();
        let err = scan.stop().await.unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(!store.scan_active());
        assert_eq!(scan.armed_timers().await, 0);
    }

    #[tokio::test]
    async fn auto_stop_fires_once_after_duration() {
        let (server, store, scan) = setup(Duration::from_millis(80)).await;
        mount_ok(&server, "/api/scan/start").await;
        Mock::given(method("POST"))
            .and(path("/api/scan/stop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = store.subscribe_scan();
        scan.start().await.unwrap();
        session.borrow_and_update();

        tokio::time::timeout(Duration::from_secs(5), session.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!store.scan_active());
        assert_eq!(scan.armed_timers().await, 0);
    }

    #[tokio::test]
    async fn superseded_timer_does_not_stop_new_session() {
        let (server, store, scan) = setup(Duration::from_millis(300)).await;
        mount_ok(&server, "/api/scan/start").await;
        mount_ok(&server, "/api/scan/stop").await;

        scan.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        scan.start().await.unwrap();

        // Past the first session's deadline, inside the second one's.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(store.scan_active());

        let stops = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/api/scan/stop")
            .count();
        assert_eq!(stops, 0);
    }

    #[tokio::test]
    async fn status_reads_backend_flag() {
        let (server, _store, scan) = setup(Duration::from_secs(30)).await;
        Mock::given(method("GET"))
            .and(path("/api/scan/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scanning": true })))
            .mount(&server)
            .await;

        assert!(scan.status().await.unwrap());
    }
}
