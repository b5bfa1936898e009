// ── Action sequencer ──
//
// Device workflows issued through the transport client. Every explicit
// action is followed by a snapshot poll, whatever its outcome, so the
// paired registry catches up with what the backend actually did.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use bluesync_api::BluetoothClient;
use bluesync_api::models::ActionResponse;

use crate::error::CoreError;
use crate::model::{DeviceDetails, MacAddress};
use crate::poller::{PollReason, Poller};
use crate::store::DeviceStore;

/// A step of the pair → trust → connect workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionStep {
    Pair,
    Trust,
    Connect,
}

pub(crate) struct Sequencer {
    client: BluetoothClient,
    store: Arc<DeviceStore>,
    poller: Arc<Poller>,
}

impl Sequencer {
    pub(crate) fn new(client: BluetoothClient, store: Arc<DeviceStore>, poller: Arc<Poller>) -> Self {
        Self {
            client,
            store,
            poller,
        }
    }

    /// Pair, trust, then connect. Stops at the first failing step; steps
    /// already done are not undone.
    pub(crate) async fn pair_and_connect(
        &self,
        mac: &MacAddress,
    ) -> Result<ActionResponse, CoreError> {
        let result = self.run_steps(mac).await;
        self.settle().await;
        result
    }

    async fn run_steps(&self, mac: &MacAddress) -> Result<ActionResponse, CoreError> {
        let mut last = None;
        for step in [ActionStep::Pair, ActionStep::Trust, ActionStep::Connect] {
            debug!(%mac, %step, "running step");
            let outcome = match step {
                ActionStep::Pair => self.client.pair(mac.as_str()).await,
                ActionStep::Trust => self.client.trust(mac.as_str()).await,
                ActionStep::Connect => self.client.connect(mac.as_str()).await,
            };
            match outcome {
                Ok(response) => last = Some(response),
                Err(e) => {
                    let message = CoreError::from(e).to_string();
                    info!(%mac, %step, %message, "workflow aborted");
                    return Err(CoreError::StepFailed { step, message });
                }
            }
        }
        last.ok_or_else(|| CoreError::Internal("empty workflow".into()))
    }

    pub(crate) async fn connect(&self, mac: &MacAddress) -> Result<ActionResponse, CoreError> {
        let result = self.client.connect(mac.as_str()).await;
        self.settle().await;
        Ok(result?)
    }

    pub(crate) async fn disconnect(&self, mac: &MacAddress) -> Result<ActionResponse, CoreError> {
        let result = self.client.disconnect(mac.as_str()).await;
        self.settle().await;
        Ok(result?)
    }

    /// Remove the device; on success it leaves the paired registry
    /// immediately, before the follow-up poll confirms it.
    pub(crate) async fn remove(&self, mac: &MacAddress) -> Result<ActionResponse, CoreError> {
        let result = self.client.remove_device(mac.as_str()).await;
        if result.is_ok() && self.store.paired.evict(mac).is_some() {
            debug!(%mac, "evicted removed device");
        }
        self.settle().await;
        Ok(result?)
    }

    pub(crate) async fn set_power(&self, on: bool) -> Result<ActionResponse, CoreError> {
        let result = self.client.set_power(on).await;
        self.settle().await;
        Ok(result?)
    }

    /// Request the opposite of the adapter's current power state.
    pub(crate) async fn toggle_power(&self) -> Result<ActionResponse, CoreError> {
        let adapter = self.store.adapter().ok_or(CoreError::NoAdapter)?;
        self.set_power(!adapter.powered).await
    }

    pub(crate) async fn trust(&self, mac: &MacAddress) -> Result<DeviceDetails, CoreError> {
        let result = self.client.trust(mac.as_str()).await;
        self.read_back(mac, result).await
    }

    pub(crate) async fn untrust(&self, mac: &MacAddress) -> Result<DeviceDetails, CoreError> {
        let result = self.client.untrust(mac.as_str()).await;
        self.read_back(mac, result).await
    }

    pub(crate) async fn device_info(&self, mac: &MacAddress) -> Result<DeviceDetails, CoreError> {
        Ok(self.client.device_info(mac.as_str()).await?.into())
    }

    /// After a trust change, fetch the device record so the caller sees
    /// the flag the backend now reports.
    async fn read_back(
        &self,
        mac: &MacAddress,
        result: Result<ActionResponse, bluesync_api::Error>,
    ) -> Result<DeviceDetails, CoreError> {
        let details = match result {
            Ok(_) => self.device_info(mac).await,
            Err(e) => Err(e.into()),
        };
        self.settle().await;
        details
    }

    async fn settle(&self) {
        self.poller.poll_logged(PollReason::Action).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::model::PairedDevice;

    const MAC: &str = "AA:BB:CC:DD:EE:01";

    async fn setup() -> (MockServer, Arc<DeviceStore>, Sequencer) {
        let server = MockServer::start().await;
        let client = BluetoothClient::new(
            Url::parse(&server.uri()).unwrap(),
            &bluesync_api::TransportConfig::default(),
        )
        .unwrap();
        let store = Arc::new(DeviceStore::new());
        let poller = Arc::new(Poller::new(client.clone(), Arc::clone(&store)));
        let sequencer = Sequencer::new(client, Arc::clone(&store), poller);
        (server, store, sequencer)
    }

    fn ok_body() -> serde_json::Value {
        json!({ "success": true, "message": "done" })
    }

    async fn mount_action(server: &MockServer, verb: &str, route: String, status: u16, hits: u64) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(ok_body())
        } else {
            ResponseTemplate::new(status).set_body_json(json!({ "detail": "Authentication Failed" }))
        };
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(template)
            .expect(hits)
            .mount(server)
            .await;
    }

    async fn mount_poll(server: &MockServer, devices: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": devices })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/adapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "adapters": [] })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn pair_failure_skips_trust_and_connect() {
        let (server, store, sequencer) = setup().await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/pair"), 400, 1).await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/trust"), 200, 0).await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/connect"), 200, 0).await;
        mount_poll(&server, json!([])).await;

        let err = sequencer
            .pair_and_connect(&MacAddress::new(MAC))
            .await
            .unwrap_err();

        match err {
            CoreError::StepFailed { step, message } => {
                assert_eq!(step, ActionStep::Pair);
                assert_eq!(message, "Authentication Failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The follow-up poll still ran.
        assert!(store.last_poll().is_some());
    }

    #[tokio::test]
    async fn trust_failure_reports_trust_step() {
        let (server, _store, sequencer) = setup().await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/pair"), 200, 1).await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/trust"), 400, 1).await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/connect"), 200, 0).await;
        mount_poll(&server, json!([])).await;

        let err = sequencer
            .pair_and_connect(&MacAddress::new(MAC))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "trust failed: Authentication Failed");
    }

    #[tokio::test]
    async fn full_workflow_polls_afterwards() {
        let (server, store, sequencer) = setup().await;
        for step in ["pair", "trust", "connect"] {
            mount_action(&server, "POST", format!("/api/devices/{MAC}/{step}"), 200, 1).await;
        }
        mount_poll(
            &server,
            json!([{ "mac": MAC, "name": "Buds", "paired": true, "connected": true, "trusted": true }]),
        )
        .await;

        let response = sequencer
            .pair_and_connect(&MacAddress::new(MAC))
            .await
            .unwrap();

        assert!(response.success);
        assert!(store.paired_device(&MacAddress::new(MAC)).unwrap().connected);
    }

    #[tokio::test]
    async fn connect_failure_still_polls() {
        let (server, store, sequencer) = setup().await;
        Mock::given(method("POST"))
            .and(path(format!("/api/devices/{MAC}/connect")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_poll(&server, json!([])).await;

        let err = sequencer.connect(&MacAddress::new(MAC)).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500");
        assert!(store.last_poll().is_some());
    }

    #[tokio::test]
    async fn remove_evicts_before_poll_confirms() {
        let (server, store, sequencer) = setup().await;
        let mac = MacAddress::new(MAC);
        store.paired.upsert(
            mac.clone(),
            PairedDevice {
                mac: mac.clone(),
                name: None,
                connected: false,
                paired: true,
                trusted: false,
                rssi: None,
            },
        );
        mount_action(&server, "DELETE", format!("/api/devices/{MAC}"), 200, 1).await;
        // Poll fails, so only the eviction can have removed it.
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        sequencer.remove(&mac).await.unwrap();
        assert!(store.paired_device(&mac).is_none());
    }

    #[tokio::test]
    async fn failed_remove_keeps_device() {
        let (server, store, sequencer) = setup().await;
        let mac = MacAddress::new(MAC);
        store.paired.upsert(
            mac.clone(),
            PairedDevice {
                mac: mac.clone(),
                name: None,
                connected: false,
                paired: true,
                trusted: false,
                rssi: None,
            },
        );
        mount_action(&server, "DELETE", format!("/api/devices/{MAC}"), 404, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(sequencer.remove(&mac).await.is_err());
        assert!(store.paired_device(&mac).is_some());
    }

    #[tokio::test]
    async fn trust_returns_read_back_details() {
        let (server, _store, sequencer) = setup().await;
        mount_action(&server, "POST", format!("/api/devices/{MAC}/trust"), 200, 1).await;
        Mock::given(method("GET"))
            .and(path(format!("/api/devices/{MAC}/info")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "mac": MAC, "name": "Buds", "trusted": "yes", "paired": true,
                "battery": 80, "uuids": [{ "uuid": "0000110b", "name": "Audio Sink" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_poll(&server, json!([])).await;

        let details = sequencer.trust(&MacAddress::new(MAC)).await.unwrap();
        assert!(details.trusted);
        assert_eq!(details.battery, Some(80));
        assert_eq!(details.services.len(), 1);
    }

    #[tokio::test]
    async fn toggle_without_adapter_is_rejected() {
        let (server, _store, sequencer) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/adapters/power"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(0)
            .mount(&server)
            .await;

        let err = sequencer.toggle_power().await.unwrap_err();
        assert!(matches!(err, CoreError::NoAdapter));
    }

    #[tokio::test]
    async fn toggle_requests_opposite_state() {
        let (server, store, sequencer) = setup().await;
        store.set_adapter(Some(crate::model::Adapter {
            id: "hci0".into(),
            name: "Den".into(),
            mac: None,
            powered: true,
            discoverable: false,
            pairable: true,
            discovering: false,
        }));
        Mock::given(method("POST"))
            .and(path("/api/adapters/power"))
            .and(wiremock::matchers::body_json(json!({ "power_on": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;
        mount_poll(&server, json!([])).await;

        sequencer.toggle_power().await.unwrap();
    }
}
