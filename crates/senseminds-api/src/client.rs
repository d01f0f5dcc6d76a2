// REST client for the SenseMinds backend
//
// Wraps `reqwest::Client` with base-URL joining, status mapping, and
// envelope unwrapping. Only the read endpoints the realtime layer needs
// (sensors, ML, health, alerts) are covered here.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Alert, AlertsBody, DataEnvelope, MlPrediction, SensorSnapshot, SystemHealth};
use crate::transport::TransportConfig;

/// HTTP client for the backend's `/api/v1` surface.
///
/// All methods return decoded payloads; `{ data: ... }` envelopes are
/// stripped before the caller sees them.
#[derive(Debug, Clone)]
pub struct SenseMindsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SenseMindsClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://10.0.0.5/api/v1`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /sensors/current`
    pub async fn current_sensors(&self) -> Result<SensorSnapshot, Error> {
        self.get(self.url("sensors/current")?).await
    }

    /// `GET /ml/current`
    pub async fn current_ml(&self) -> Result<MlPrediction, Error> {
        self.get(self.url("ml/current")?).await
    }

    /// `GET /system/health`, unwrapping the `{ data: ... }` envelope.
    pub async fn system_health(&self) -> Result<SystemHealth, Error> {
        let envelope: DataEnvelope<SystemHealth> = self.get(self.url("system/health")?).await?;
        Ok(envelope.data)
    }

    /// `GET /alerts/recent?hours={hours}&limit={limit}`
    pub async fn recent_alerts(&self, hours: u32, limit: u32) -> Result<Vec<Alert>, Error> {
        let mut url = self.url("alerts/recent")?;
        url.query_pairs_mut()
            .append_pair("hours", &hours.to_string())
            .append_pair("limit", &limit.to_string());
        let body: AlertsBody = self.get(url).await?;
        Ok(body.into_alerts())
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Join a relative endpoint path onto the base URL, keeping any
    /// path prefix the base carries (`/api/v1`).
    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        debug!(status = status.as_u16(), "API response");

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: status_message(status),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Human-readable explanation for the statuses the backend commonly returns.
fn status_message(status: reqwest::StatusCode) -> String {
    match status.as_u16() {
        404 => "Endpoint not found".into(),
        405 => "Method not allowed - check if correct HTTP method is used".into(),
        500 => "Server error - please try again later".into(),
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_keeps_base_path_prefix() {
        let client = SenseMindsClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://10.0.0.5/api/v1/").unwrap(),
        );
        assert_eq!(
            client.url("ml/current").unwrap().as_str(),
            "http://10.0.0.5/api/v1/ml/current"
        );
    }

    #[test]
    fn status_messages() {
        assert_eq!(
            status_message(reqwest::StatusCode::NOT_FOUND),
            "Endpoint not found"
        );
        assert_eq!(
            status_message(reqwest::StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
    }
}
