// REST client for the Bluetooth manager backend
//
// Wraps `reqwest::Client` with base-path aware URL construction and the
// backend's `{detail}` error convention. Every call is bounded by the
// transport timeout; nothing here retries.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    ActionResponse, AdapterInfo, AdapterList, AdapterSummary, DeviceInfo, DeviceList,
    DeviceRecord, ErrorBody, HealthStatus, PowerRequest, ScanStatus,
};
use crate::transport::TransportConfig;

/// Async client for the Bluetooth manager REST API.
///
/// `base_url` is the backend root including any reverse-proxy prefix
/// (e.g. `http://homeassistant:8099/api/hassio_ingress/abc`); endpoint
/// paths are appended to it verbatim. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BluetoothClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BluetoothClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The backend base URL (including any path prefix).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Adapter ──────────────────────────────────────────────────────

    pub async fn list_adapters(&self) -> Result<Vec<AdapterSummary>, Error> {
        let list: AdapterList = self.get("api/adapters").await?;
        Ok(list.adapters)
    }

    pub async fn adapter_info(&self, adapter_id: &str) -> Result<AdapterInfo, Error> {
        self.get(&format!("api/adapters/{adapter_id}/info")).await
    }

    pub async fn set_power(&self, power_on: bool) -> Result<ActionResponse, Error> {
        self.post("api/adapters/power", Some(&PowerRequest { power_on }))
            .await
    }

    // ── Scan ─────────────────────────────────────────────────────────

    pub async fn start_scan(&self) -> Result<ActionResponse, Error> {
        self.post::<_, ()>("api/scan/start", None).await
    }

    pub async fn stop_scan(&self) -> Result<ActionResponse, Error> {
        self.post::<_, ()>("api/scan/stop", None).await
    }

    pub async fn scan_status(&self) -> Result<ScanStatus, Error> {
        self.get("api/scan/status").await
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let list: DeviceList = self.get("api/devices").await?;
        Ok(list.devices)
    }

    pub async fn device_info(&self, mac: &str) -> Result<DeviceInfo, Error> {
        self.get(&format!("api/devices/{mac}/info")).await
    }

    pub async fn pair(&self, mac: &str) -> Result<ActionResponse, Error> {
        self.device_action(mac, "pair").await
    }

    pub async fn trust(&self, mac: &str) -> Result<ActionResponse, Error> {
        self.device_action(mac, "trust").await
    }

    pub async fn untrust(&self, mac: &str) -> Result<ActionResponse, Error> {
        self.device_action(mac, "untrust").await
    }

    pub async fn connect(&self, mac: &str) -> Result<ActionResponse, Error> {
        self.device_action(mac, "connect").await
    }

    pub async fn disconnect(&self, mac: &str) -> Result<ActionResponse, Error> {
        self.device_action(mac, "disconnect").await
    }

    pub async fn remove_device(&self, mac: &str) -> Result<ActionResponse, Error> {
        let url = self.url(&format!("api/devices/{mac}"))?;
        debug!("DELETE {}", url);
        let resp = self.http.delete(url).send().await?;
        parse_response(resp).await
    }

    // ── Misc ─────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthStatus, Error> {
        self.get("api/health").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn device_action(&self, mac: &str, action: &str) -> Result<ActionResponse, Error> {
        self.post::<_, ()>(&format!("api/devices/{mac}/{action}"), None)
            .await
    }

    /// `{base}/{path}` with the base path prefix preserved.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = self.url(path)?;
        debug!("POST {}", url);
        let mut builder = self.http.post(url);
        builder = match body {
            Some(body) => builder.json(body),
            None => builder.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };
        let resp = builder.send().await?;
        parse_response(resp).await
    }
}

/// Decode a success body, or turn a non-success response into
/// [`Error::Api`] using the backend's `detail` string.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            detail: error_detail(status, &body),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

/// Extract `detail` from an error body, falling back to `HTTP {status}`.
fn error_detail(status: StatusCode, body: &str) -> String {
    let fallback = || format!("HTTP {}", status.as_u16());
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
        }) if !detail.is_empty() => detail,
        Ok(ErrorBody {
            detail: Some(other),
        }) if !other.is_null() => other.to_string(),
        _ => fallback(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> BluetoothClient {
        BluetoothClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn url_keeps_reverse_proxy_prefix() {
        let c = client("http://ha.local:8123/api/hassio_ingress/tok3n/");
        assert_eq!(
            c.url("api/devices").unwrap().as_str(),
            "http://ha.local:8123/api/hassio_ingress/tok3n/api/devices"
        );
    }

    #[test]
    fn url_without_prefix() {
        let c = client("http://localhost:8099");
        assert_eq!(
            c.url("api/scan/start").unwrap().as_str(),
            "http://localhost:8099/api/scan/start"
        );
    }

    #[test]
    fn detail_string_is_used_verbatim() {
        let detail = error_detail(StatusCode::BAD_REQUEST, r#"{"detail":"Device not found"}"#);
        assert_eq!(detail, "Device not found");
    }

    #[test]
    fn missing_or_unparsable_body_falls_back_to_status() {
        assert_eq!(
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            "HTTP 500"
        );
        assert_eq!(error_detail(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(error_detail(StatusCode::NOT_FOUND, "{}"), "HTTP 404");
    }

    #[test]
    fn structured_detail_is_stringified() {
        let detail = error_detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","power_on"],"msg":"field required"}]}"#,
        );
        assert!(detail.contains("field required"));
    }
}
