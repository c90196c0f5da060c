//! The hybrid client: structured API first, CLI fallback second.
//!
//! Every logical operation is attempted through the structured API path
//! when credentials are available, and falls back to invoking the external
//! CLI and parsing its tabular output when the API path fails for any
//! reason other than authentication or invalid input. Both paths run
//! through the same [`RetryingTransport`].

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use tracing::{debug, warn};

use podgrid_proto::{GpuType, Pod, ResourceOffering};

use crate::error::{ClientError, ClientResult};
use crate::retry::RetryingTransport;

/// Filters for an offering discovery call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfferingQuery {
    /// Restrict to one GPU type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<GpuType>,
    /// Restrict to these regions (empty = anywhere).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<String>,
    /// Minimum GPUs per instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_gpu_count: Option<u32>,
}

/// Everything the external system needs to provision a pod.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePodRequest {
    /// Pod name.
    pub name: String,
    /// GPU type to provision.
    pub gpu_type: GpuType,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Configuration id of the offering being provisioned from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offering_id: Option<String>,
    /// Target region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Container image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Disk size in GB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u32>,
    /// Environment variables.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Hourly cost of the selected offering. Local bookkeeping only, never
    /// sent to the external system.
    #[serde(skip)]
    pub cost_per_hour: Option<f64>,
}

/// Which transport path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// The structured API. Identifiers are authoritative.
    Api,
    /// Parsed CLI output. Lower confidence: identifiers produced by the
    /// CLI's create path may differ from the API-assigned id, and fields
    /// the tables do not print are absent.
    CliFallback,
}

/// A result tagged with the transport path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    /// The payload.
    pub value: T,
    /// Where it came from.
    pub origin: DataOrigin,
}

impl<T> Sourced<T> {
    /// Tag a value as API-sourced.
    #[must_use]
    pub const fn api(value: T) -> Self {
        Self {
            value,
            origin: DataOrigin::Api,
        }
    }

    /// Tag a value as CLI-fallback-sourced.
    #[must_use]
    pub const fn fallback(value: T) -> Self {
        Self {
            value,
            origin: DataOrigin::CliFallback,
        }
    }

    /// Whether identifiers in this result can be trusted for subsequent
    /// remote operations. Callers needing a guaranteed-valid identifier
    /// must prefer an API-sourced one when both paths were attempted.
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self.origin, DataOrigin::Api)
    }

    /// Unwrap the payload, discarding the origin tag.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// One transport path's implementation of the remote operations.
///
/// Implemented by the structured API client and by the CLI wrapper; tests
/// substitute mocks to assert call counts and fallback behavior.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// List discoverable offerings.
    async fn list_offerings(&self, query: &OfferingQuery) -> ClientResult<Vec<ResourceOffering>>;

    /// List the GPU type names the external system knows.
    async fn list_gpu_types(&self) -> ClientResult<Vec<String>>;

    /// Provision a pod.
    async fn create_pod(&self, request: &CreatePodRequest) -> ClientResult<Pod>;

    /// Fetch one pod's current state.
    async fn get_pod(&self, id: &str) -> ClientResult<Pod>;

    /// List pods.
    async fn list_pods(&self) -> ClientResult<Vec<Pod>>;

    /// Fetch up to `max_lines` of a pod's logs.
    async fn pod_logs(&self, id: &str, max_lines: u32) -> ClientResult<String>;

    /// Terminate a pod.
    async fn terminate_pod(&self, id: &str) -> ClientResult<()>;
}

/// Hybrid client over an optional API backend and a CLI backend.
#[derive(Debug)]
pub struct HybridClient<A, C> {
    api: Option<A>,
    cli: C,
    transport: RetryingTransport,
}

impl<A: Backend, C: Backend> HybridClient<A, C> {
    /// Build a hybrid client.
    ///
    /// `api` is `None` when no API credential context is available; every
    /// operation then goes straight to the CLI path.
    #[must_use]
    pub fn new(api: Option<A>, cli: C, transport: RetryingTransport) -> Self {
        Self {
            api,
            cli,
            transport,
        }
    }

    /// Whether the structured API path is configured.
    #[must_use]
    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    /// The API backend, when configured.
    #[must_use]
    pub fn api_backend(&self) -> Option<&A> {
        self.api.as_ref()
    }

    /// The CLI backend.
    #[must_use]
    pub fn cli_backend(&self) -> &C {
        &self.cli
    }

    async fn call<T, Fa, FutA, Fc, FutC>(
        &self,
        name: &str,
        api_op: Option<Fa>,
        mut cli_op: Fc,
    ) -> ClientResult<Sourced<T>>
    where
        Fa: FnMut() -> FutA,
        FutA: Future<Output = ClientResult<T>>,
        Fc: FnMut() -> FutC,
        FutC: Future<Output = ClientResult<T>>,
    {
        let api_error = match api_op {
            Some(mut op) => {
                match self.transport.execute(&format!("{name}[api]"), || op()).await {
                    Ok(value) => return Ok(Sourced::api(value)),
                    Err(err) if err.bypasses_fallback() => return Err(err),
                    Err(err) => {
                        warn!(operation = name, error = %err, "api path failed, falling back to cli");
                        Some(err)
                    }
                }
            }
            None => {
                debug!(operation = name, "no api credentials, using cli path");
                None
            }
        };

        match self
            .transport
            .execute(&format!("{name}[cli]"), || cli_op())
            .await
        {
            Ok(value) => Ok(Sourced::fallback(value)),
            Err(cli_err) => Err(match api_error {
                Some(api_err) => ClientError::fallback_failed(api_err, cli_err),
                None => cli_err,
            }),
        }
    }

    /// List discoverable offerings.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn list_offerings(
        &self,
        query: &OfferingQuery,
    ) -> ClientResult<Sourced<Vec<ResourceOffering>>> {
        self.call(
            "list_offerings",
            self.api.as_ref().map(|api| move || api.list_offerings(query)),
            || self.cli.list_offerings(query),
        )
        .await
    }

    /// List the GPU type names the external system recognizes.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn list_gpu_types(&self) -> ClientResult<Sourced<Vec<String>>> {
        self.call(
            "list_gpu_types",
            self.api.as_ref().map(|api| move || api.list_gpu_types()),
            || self.cli.list_gpu_types(),
        )
        .await
    }

    /// Provision a pod.
    ///
    /// An API-sourced result carries the authoritative identifier; a
    /// CLI-fallback result is flagged lower-confidence via its origin.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn create_pod(&self, request: &CreatePodRequest) -> ClientResult<Sourced<Pod>> {
        self.call(
            "create_pod",
            self.api.as_ref().map(|api| move || api.create_pod(request)),
            || self.cli.create_pod(request),
        )
        .await
    }

    /// Fetch one pod's current state.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn get_pod(&self, id: &str) -> ClientResult<Sourced<Pod>> {
        self.call(
            "get_pod",
            self.api.as_ref().map(|api| move || api.get_pod(id)),
            || self.cli.get_pod(id),
        )
        .await
    }

    /// List pods.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn list_pods(&self) -> ClientResult<Sourced<Vec<Pod>>> {
        self.call(
            "list_pods",
            self.api.as_ref().map(|api| move || api.list_pods()),
            || self.cli.list_pods(),
        )
        .await
    }

    /// Fetch up to `max_lines` of a pod's logs.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn pod_logs(&self, id: &str, max_lines: u32) -> ClientResult<Sourced<String>> {
        self.call(
            "pod_logs",
            self.api
                .as_ref()
                .map(|api| move || api.pod_logs(id, max_lines)),
            || self.cli.pod_logs(id, max_lines),
        )
        .await
    }

    /// Terminate a pod.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors per the fallback policy.
    pub async fn terminate_pod(&self, id: &str) -> ClientResult<Sourced<()>> {
        self.call(
            "terminate_pod",
            self.api.as_ref().map(|api| move || api.terminate_pod(id)),
            || self.cli.terminate_pod(id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Succeed,
        FailAuth,
        FailTransient,
        FailNotFound,
        FailInvalidInput,
    }

    struct MockBackend {
        label: &'static str,
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl MockBackend {
        fn new(label: &'static str, behavior: Behavior) -> Self {
            Self {
                label,
                behavior,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn outcome<T>(&self, value: T) -> ClientResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(value),
                Behavior::FailAuth => Err(ClientError::authentication("mock 401")),
                Behavior::FailTransient => Err(ClientError::connection("mock reset")),
                Behavior::FailNotFound => Err(ClientError::not_found("mock resource")),
                Behavior::FailInvalidInput => Err(ClientError::invalid_input("mock 422")),
            }
        }

        fn offering(&self) -> ResourceOffering {
            ResourceOffering {
                id: format!("{}-cfg", self.label),
                gpu_type: GpuType::H100_80GB,
                gpu_count: 1,
                available_count: 1,
                total_count: 1,
                cost_per_hour: 2.0,
                provider: "Datacrunch".into(),
                region: "FIN-01".into(),
            }
        }
    }

    impl Backend for MockBackend {
        async fn list_offerings(
            &self,
            _query: &OfferingQuery,
        ) -> ClientResult<Vec<ResourceOffering>> {
            let offering = self.offering();
            self.outcome(vec![offering])
        }

        async fn list_gpu_types(&self) -> ClientResult<Vec<String>> {
            self.outcome(vec!["H100_80GB".into()])
        }

        async fn create_pod(&self, request: &CreatePodRequest) -> ClientResult<Pod> {
            let pod = Pod {
                id: format!("{}-pod", self.label),
                name: request.name.clone(),
                gpu_type: request.gpu_type,
                gpu_count: request.gpu_count,
                status: podgrid_proto::PodStatus::Pending,
                cost_per_hour: request.cost_per_hour.unwrap_or(0.0),
                created_at: chrono::Utc::now(),
                started_at: None,
                stopped_at: None,
                ssh_connection: None,
                provider: "mock".into(),
                region: "mock".into(),
                image: None,
                disk_gb: None,
                env: BTreeMap::new(),
            };
            self.outcome(pod)
        }

        async fn get_pod(&self, id: &str) -> ClientResult<Pod> {
            let mut pod = self
                .create_pod(&CreatePodRequest {
                    name: "probe".into(),
                    gpu_type: GpuType::H100_80GB,
                    gpu_count: 1,
                    offering_id: None,
                    region: None,
                    image: None,
                    disk_gb: None,
                    env: BTreeMap::new(),
                    cost_per_hour: None,
                })
                .await?;
            pod.id = id.to_string();
            Ok(pod)
        }

        async fn list_pods(&self) -> ClientResult<Vec<Pod>> {
            self.outcome(Vec::new())
        }

        async fn pod_logs(&self, _id: &str, _max_lines: u32) -> ClientResult<String> {
            self.outcome(format!("{} logs", self.label))
        }

        async fn terminate_pod(&self, _id: &str) -> ClientResult<()> {
            self.outcome(())
        }
    }

    fn fast_transport(max_attempts: u32) -> RetryingTransport {
        RetryingTransport::new(RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            jitter: Duration::ZERO,
            max_delay: Duration::from_millis(5),
        })
    }

    fn client(
        api: Option<MockBackend>,
        cli: MockBackend,
        max_attempts: u32,
    ) -> HybridClient<MockBackend, MockBackend> {
        HybridClient::new(api, cli, fast_transport(max_attempts))
    }

    #[tokio::test]
    async fn api_success_never_touches_cli() {
        let c = client(
            Some(MockBackend::new("api", Behavior::Succeed)),
            MockBackend::new("cli", Behavior::Succeed),
            3,
        );

        let result = c.list_offerings(&OfferingQuery::default()).await.expect("ok");
        assert_eq!(result.origin, DataOrigin::Api);
        assert!(result.is_authoritative());
        assert_eq!(result.value[0].id, "api-cfg");
        assert_eq!(c.api.as_ref().expect("api").calls(), 1);
        assert_eq!(c.cli.calls(), 0);
    }

    #[tokio::test]
    async fn auth_error_surfaces_without_fallback() {
        let c = client(
            Some(MockBackend::new("api", Behavior::FailAuth)),
            MockBackend::new("cli", Behavior::Succeed),
            3,
        );

        let err = c
            .list_offerings(&OfferingQuery::default())
            .await
            .expect_err("must fail");
        assert!(matches!(err, ClientError::Authentication { .. }));
        assert_eq!(c.api.as_ref().expect("api").calls(), 1);
        assert_eq!(c.cli.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_input_surfaces_without_fallback() {
        let c = client(
            Some(MockBackend::new("api", Behavior::FailInvalidInput)),
            MockBackend::new("cli", Behavior::Succeed),
            3,
        );

        let err = c
            .list_offerings(&OfferingQuery::default())
            .await
            .expect_err("must fail");
        assert!(matches!(err, ClientError::InvalidInput { .. }));
        assert_eq!(c.cli.calls(), 0);
    }

    #[tokio::test]
    async fn transient_api_exhaustion_falls_back_to_cli_once() {
        let c = client(
            Some(MockBackend::new("api", Behavior::FailTransient)),
            MockBackend::new("cli", Behavior::Succeed),
            3,
        );

        let result = c.list_offerings(&OfferingQuery::default()).await.expect("ok");
        assert_eq!(result.origin, DataOrigin::CliFallback);
        assert!(!result.is_authoritative());
        assert_eq!(result.value[0].id, "cli-cfg");
        // API path retried to exhaustion, CLI fallback ran one pass.
        assert_eq!(c.api.as_ref().expect("api").calls(), 3);
        assert_eq!(c.cli.calls(), 1);
    }

    #[tokio::test]
    async fn non_transient_api_error_still_falls_back() {
        let c = client(
            Some(MockBackend::new("api", Behavior::FailNotFound)),
            MockBackend::new("cli", Behavior::Succeed),
            3,
        );

        let result = c.get_pod("pod-1").await.expect("ok");
        assert_eq!(result.origin, DataOrigin::CliFallback);
        assert_eq!(c.api.as_ref().expect("api").calls(), 1);
        assert_eq!(c.cli.calls(), 1);
    }

    #[tokio::test]
    async fn no_credentials_goes_straight_to_cli() {
        let c = client(None, MockBackend::new("cli", Behavior::Succeed), 3);

        let result = c.list_offerings(&OfferingQuery::default()).await.expect("ok");
        assert_eq!(result.origin, DataOrigin::CliFallback);
        assert_eq!(c.cli.calls(), 1);
        assert!(!c.has_api());
    }

    #[tokio::test]
    async fn both_paths_failing_reports_api_error_first() {
        let c = client(
            Some(MockBackend::new("api", Behavior::FailTransient)),
            MockBackend::new("cli", Behavior::FailNotFound),
            2,
        );

        let err = c
            .list_offerings(&OfferingQuery::default())
            .await
            .expect_err("must fail");
        match &err {
            ClientError::FallbackFailed { api, cli } => {
                assert!(matches!(**api, ClientError::RetryExhausted { .. }));
                assert!(matches!(**cli, ClientError::NotFound { .. }));
            }
            other => panic!("expected FallbackFailed, got {other:?}"),
        }
        assert!(err.to_string().starts_with("api error:"));
    }

    #[tokio::test]
    async fn cli_only_failure_is_not_wrapped() {
        let c = client(None, MockBackend::new("cli", Behavior::FailNotFound), 2);

        let err = c.get_pod("missing").await.expect_err("must fail");
        assert!(matches!(err, ClientError::NotFound { .. }));
    }
}
