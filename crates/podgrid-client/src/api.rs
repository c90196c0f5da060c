//! Structured API client for the external provisioning system.
//!
//! Speaks JSON over HTTPS with bearer-token auth. HTTP status codes map
//! onto the [`ClientError`] taxonomy so the retry engine and the hybrid
//! fallback policy can classify failures uniformly with the CLI path.

use std::collections::BTreeMap;
use std::path::PathBuf;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use podgrid_proto::{GpuType, Pod, PodStatus, ResourceOffering};

use crate::client::{Backend, CreatePodRequest, OfferingQuery};
use crate::error::{ClientError, ClientResult};
use crate::retry::ATTEMPT_TIMEOUT;

/// Default API endpoint of the external provisioning system.
pub const DEFAULT_API_BASE_URL: &str = "https://api.primeintellect.ai";

/// Environment variable consulted first for the API key.
pub const API_KEY_ENV: &str = "PRIME_API_KEY";

/// Bearer credentials for the structured API.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials").finish_non_exhaustive()
    }
}

impl ApiCredentials {
    /// Wrap an explicit API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Discover credentials from the environment.
    ///
    /// Checks the `PRIME_API_KEY` environment variable, then the external
    /// tool's own login state (`~/.config/prime/config.json`). Returns
    /// `None` when neither yields a key — that is not an error, it just
    /// means operations will use the CLI path.
    #[must_use]
    pub fn discover() -> Option<Self> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                return Some(Self::new(key));
            }
        }

        let home = std::env::var_os("HOME")?;
        let config_path = PathBuf::from(home).join(".config/prime/config.json");
        let text = std::fs::read_to_string(&config_path).ok()?;
        let doc: serde_json::Value = serde_json::from_str(&text).ok()?;
        let key = doc.get("api_key")?.as_str()?.trim();
        if key.is_empty() {
            None
        } else {
            debug!(path = %config_path.display(), "using api key from external tool login");
            Some(Self::new(key))
        }
    }
}

/// HTTP client for the structured API path.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: ApiCredentials,
}

impl ApiClient {
    /// Client against the default endpoint.
    #[must_use]
    pub fn new(credentials: ApiCredentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_API_BASE_URL)
    }

    /// Client against a custom endpoint (tests, staging).
    #[must_use]
    pub fn with_base_url(credentials: ApiCredentials, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn map_transport_error(path: &str, err: &reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::timeout(format!("GET {path}"), ATTEMPT_TIMEOUT.as_secs())
        } else if err.is_connect() {
            ClientError::connection(err.to_string())
        } else {
            ClientError::http(err.to_string())
        }
    }

    fn status_error(status: StatusCode, body: &str, path: &str) -> ClientError {
        let message = if body.trim().is_empty() {
            format!("{path}: {status}")
        } else {
            format!("{path}: {status}: {}", body.trim())
        };
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ClientError::authentication(message)
            }
            StatusCode::TOO_MANY_REQUESTS => ClientError::rate_limited(message),
            StatusCode::NOT_FOUND => ClientError::not_found(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::invalid_input(message)
            }
            s if s.is_server_error() => ClientError::connection(message),
            _ => ClientError::http(message),
        }
    }

    async fn check(response: reqwest::Response, path: &str) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::status_error(status, &body, path))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.credentials.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(path, &e))?;
        Self::check(response, path)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::http(format!("{path}: body decode failed: {e}")))
    }

    fn offering_params(query: &OfferingQuery) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(gpu_type) = query.gpu_type {
            params.push(("gpu_type", gpu_type.to_string()));
        }
        if !query.regions.is_empty() {
            params.push(("regions", query.regions.join(",")));
        }
        if let Some(count) = query.min_gpu_count {
            params.push(("gpu_count", count.to_string()));
        }
        params
    }
}

impl Backend for ApiClient {
    async fn list_offerings(&self, query: &OfferingQuery) -> ClientResult<Vec<ResourceOffering>> {
        let params = Self::offering_params(query);

        // Single-node and cluster offerings live behind separate endpoints;
        // callers see one combined listing.
        let singles: Vec<wire::AvailabilityItem> =
            self.get_json("/api/v1/availability", &params).await?;
        let clusters: Vec<wire::AvailabilityItem> = self
            .get_json("/api/v1/availability/clusters", &params)
            .await?;

        Ok(singles
            .into_iter()
            .chain(clusters)
            .map(wire::AvailabilityItem::into_offering)
            .collect())
    }

    async fn list_gpu_types(&self) -> ClientResult<Vec<String>> {
        let doc: serde_json::Value = self.get_json("/api/v1/availability/gpu-types", &[]).await?;
        wire::gpu_types_from(doc)
    }

    async fn create_pod(&self, request: &CreatePodRequest) -> ClientResult<Pod> {
        let path = "/api/v1/pods";
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.credentials.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(path, &e))?;
        let pod: wire::ApiPod = Self::check(response, path)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::http(format!("{path}: body decode failed: {e}")))?;
        Ok(pod.into_pod(request.cost_per_hour))
    }

    async fn get_pod(&self, id: &str) -> ClientResult<Pod> {
        let pod: wire::ApiPod = self.get_json(&format!("/api/v1/pods/{id}"), &[]).await?;
        Ok(pod.into_pod(None))
    }

    async fn list_pods(&self) -> ClientResult<Vec<Pod>> {
        let pods: Vec<wire::ApiPod> = self.get_json("/api/v1/pods", &[]).await?;
        Ok(pods.into_iter().map(|p| p.into_pod(None)).collect())
    }

    async fn pod_logs(&self, id: &str, max_lines: u32) -> ClientResult<String> {
        let doc: serde_json::Value = self
            .get_json(
                &format!("/api/v1/pods/{id}/logs"),
                &[("tail", max_lines.to_string())],
            )
            .await?;
        wire::logs_from(doc)
    }

    async fn terminate_pod(&self, id: &str) -> ClientResult<()> {
        let path = format!("/api/v1/pods/{id}");
        let response = self
            .http
            .delete(format!("{}{path}", self.base_url))
            .bearer_auth(&self.credentials.api_key)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(&path, &e))?;
        Self::check(response, &path).await?;
        Ok(())
    }
}

/// Wire-format structs, kept separate from the domain types so response
/// shape changes stay contained here.
mod wire {
    use super::{
        BTreeMap, ClientError, ClientResult, GpuType, Pod, PodStatus, ResourceOffering,
    };
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    fn one() -> u32 {
        1
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Prices {
        #[serde(default)]
        pub community: Option<f64>,
        #[serde(default)]
        pub on_demand: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Slots {
        #[serde(default)]
        pub available: u32,
        #[serde(default)]
        pub total: u32,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AvailabilityItem {
        #[serde(default)]
        pub id: String,
        #[serde(default)]
        pub gpu_type: String,
        #[serde(default = "one")]
        pub gpu_count: u32,
        #[serde(default)]
        pub prices: Option<Prices>,
        #[serde(default)]
        pub availability: Option<Slots>,
        #[serde(default)]
        pub available_gpus: Option<u32>,
        #[serde(default)]
        pub total_gpus: Option<u32>,
        #[serde(default)]
        pub provider: String,
        #[serde(default)]
        pub country: Option<String>,
        #[serde(default)]
        pub location: Option<String>,
    }

    impl AvailabilityItem {
        pub(super) fn into_offering(self) -> ResourceOffering {
            // Community pricing is preferred when the provider offers both.
            let cost_per_hour = self
                .prices
                .as_ref()
                .and_then(|p| p.community.or(p.on_demand))
                .unwrap_or(0.0);
            let (available_count, total_count) = match &self.availability {
                Some(slots) => (slots.available, slots.total),
                None => {
                    let available = self.available_gpus.unwrap_or(0);
                    (available, self.total_gpus.unwrap_or(available))
                }
            };
            ResourceOffering {
                gpu_type: GpuType::from_label(&self.gpu_type),
                gpu_count: self.gpu_count,
                available_count,
                total_count,
                cost_per_hour,
                provider: if self.provider.is_empty() {
                    "Unknown".to_string()
                } else {
                    self.provider
                },
                region: self
                    .country
                    .or(self.location)
                    .unwrap_or_else(|| "Unknown".to_string()),
                id: self.id,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ApiPod {
        pub id: String,
        #[serde(default)]
        pub name: String,
        #[serde(default)]
        pub gpu_type: String,
        #[serde(default = "one")]
        pub gpu_count: u32,
        #[serde(default)]
        pub status: String,
        #[serde(default)]
        pub cost_per_hour: Option<f64>,
        #[serde(default)]
        pub created_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub started_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub stopped_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub ssh_connection: Option<String>,
        #[serde(default)]
        pub provider: String,
        #[serde(default)]
        pub region: String,
        #[serde(default)]
        pub image: Option<String>,
        #[serde(default)]
        pub disk_gb: Option<u32>,
        #[serde(default)]
        pub env: BTreeMap<String, String>,
    }

    impl ApiPod {
        pub(super) fn into_pod(self, fallback_cost: Option<f64>) -> Pod {
            Pod {
                id: self.id,
                name: self.name,
                gpu_type: GpuType::from_label(&self.gpu_type),
                gpu_count: self.gpu_count,
                status: PodStatus::from_label(&self.status),
                cost_per_hour: self.cost_per_hour.or(fallback_cost).unwrap_or(0.0),
                created_at: self.created_at.unwrap_or_else(Utc::now),
                started_at: self.started_at,
                stopped_at: self.stopped_at,
                ssh_connection: self.ssh_connection,
                provider: self.provider,
                region: self.region,
                image: self.image,
                disk_gb: self.disk_gb,
                env: self.env,
            }
        }
    }

    /// Accept both `["H100_80GB", ...]` and `[{"gpu_type": ...}, ...]`.
    pub(super) fn gpu_types_from(doc: serde_json::Value) -> ClientResult<Vec<String>> {
        let items = doc
            .as_array()
            .ok_or_else(|| ClientError::http("gpu-types: expected a JSON array"))?;
        Ok(items
            .iter()
            .filter_map(|item| {
                item.as_str()
                    .map(ToString::to_string)
                    .or_else(|| item.get("gpu_type")?.as_str().map(ToString::to_string))
            })
            .collect())
    }

    /// Accept `{"logs": "..."}`, `{"lines": [...]}` or a bare string.
    pub(super) fn logs_from(doc: serde_json::Value) -> ClientResult<String> {
        if let Some(text) = doc.as_str() {
            return Ok(text.to_string());
        }
        if let Some(text) = doc.get("logs").and_then(serde_json::Value::as_str) {
            return Ok(text.to_string());
        }
        if let Some(lines) = doc.get("lines").and_then(serde_json::Value::as_array) {
            return Ok(lines
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"));
        }
        Err(ClientError::http("logs: unrecognized response shape"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_classification() {
        let cases = [
            (StatusCode::UNAUTHORIZED, "authentication failed"),
            (StatusCode::FORBIDDEN, "authentication failed"),
            (StatusCode::TOO_MANY_REQUESTS, "rate limited"),
            (StatusCode::NOT_FOUND, "not found"),
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid input"),
            (StatusCode::INTERNAL_SERVER_ERROR, "connection error"),
        ];
        for (status, expected_prefix) in cases {
            let err = ApiClient::status_error(status, "details", "/api/v1/pods");
            assert!(
                err.to_string().starts_with(expected_prefix),
                "{status}: {err}"
            );
        }
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let transient = ApiClient::status_error(StatusCode::BAD_GATEWAY, "", "/x");
        assert!(transient.is_transient());
        let rate = ApiClient::status_error(StatusCode::TOO_MANY_REQUESTS, "", "/x");
        assert!(rate.is_transient());
        let auth = ApiClient::status_error(StatusCode::UNAUTHORIZED, "", "/x");
        assert!(!auth.is_transient());
        let invalid = ApiClient::status_error(StatusCode::BAD_REQUEST, "", "/x");
        assert!(!invalid.is_transient());
    }

    #[test]
    fn availability_item_prefers_community_price() {
        let item: wire::AvailabilityItem = serde_json::from_value(serde_json::json!({
            "id": "cfg-7",
            "gpu_type": "H100 80GB",
            "gpu_count": 8,
            "prices": {"community": 2.5, "on_demand": 3.9},
            "availability": {"available": 3, "total": 8},
            "provider": "Datacrunch",
            "country": "Finland"
        }))
        .expect("deserialize");

        let offering = item.into_offering();
        assert_eq!(offering.id, "cfg-7");
        assert_eq!(offering.gpu_type, GpuType::H100_80GB);
        assert!((offering.cost_per_hour - 2.5).abs() < 1e-9);
        assert_eq!(offering.available_count, 3);
        assert_eq!(offering.region, "Finland");
    }

    #[test]
    fn availability_item_tolerates_flat_shape() {
        let item: wire::AvailabilityItem = serde_json::from_value(serde_json::json!({
            "id": "cfg-8",
            "gpu_type": "A100_40GB",
            "available_gpus": 2,
            "location": "us-west-2"
        }))
        .expect("deserialize");

        let offering = item.into_offering();
        assert_eq!(offering.available_count, 2);
        assert_eq!(offering.total_count, 2);
        assert_eq!(offering.region, "us-west-2");
        assert!(offering.is_free()); // no price info at all
    }

    #[test]
    fn api_pod_status_normalized() {
        let pod: wire::ApiPod = serde_json::from_value(serde_json::json!({
            "id": "pod-42",
            "name": "trainer",
            "gpu_type": "H100_80GB",
            "gpu_count": 2,
            "status": "CREATING"
        }))
        .expect("deserialize");

        let pod = pod.into_pod(Some(5.0));
        assert_eq!(pod.status, PodStatus::Pending);
        assert!((pod.cost_per_hour - 5.0).abs() < 1e-9);
    }

    #[test]
    fn gpu_types_accepts_both_shapes() {
        let flat = serde_json::json!(["H100_80GB", "T4"]);
        assert_eq!(
            wire::gpu_types_from(flat).expect("flat"),
            vec!["H100_80GB", "T4"]
        );

        let nested = serde_json::json!([{"gpu_type": "L40S"}, {"gpu_type": "L4"}]);
        assert_eq!(wire::gpu_types_from(nested).expect("nested"), vec!["L40S", "L4"]);

        assert!(wire::gpu_types_from(serde_json::json!({"nope": 1})).is_err());
    }

    #[test]
    fn logs_accepts_known_shapes() {
        assert_eq!(
            wire::logs_from(serde_json::json!({"logs": "line1\nline2"})).expect("logs"),
            "line1\nline2"
        );
        assert_eq!(
            wire::logs_from(serde_json::json!({"lines": ["a", "b"]})).expect("lines"),
            "a\nb"
        );
        assert_eq!(wire::logs_from(serde_json::json!("raw")).expect("raw"), "raw");
        assert!(wire::logs_from(serde_json::json!(42)).is_err());
    }

    #[test]
    fn credentials_debug_hides_key() {
        let creds = ApiCredentials::new("secret-key");
        assert!(!format!("{creds:?}").contains("secret-key"));
    }
}
