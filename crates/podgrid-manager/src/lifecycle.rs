//! Pod lifecycle operations: create, status, logs, terminate, ssh.
//!
//! The lifecycle per pod is `pending -> running -> terminated`, with
//! `failed` reachable from both non-terminal states; `terminated` and
//! `failed` are terminal (see `PodStatus::can_transition`). Status is
//! never inferred locally — every query goes back to the external system
//! through the hybrid client.

use serde::Serialize;
use tracing::{debug, info};

use podgrid_client::{Backend, CreatePodRequest, HybridClient, Sourced};
use podgrid_proto::{Pod, PodSpec, ResourceOffering};

use crate::error::{ManagerError, ManagerResult};
use crate::finder::{FindCriteria, ResourceFinder, SortKey};

/// What a dry-run create would have provisioned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    /// The name the pod would get.
    pub pod_name: String,
    /// The offering that would be provisioned from.
    pub offering: ResourceOffering,
    /// Projected hourly cost: offering cost-per-hour x requested count.
    pub hourly_cost: f64,
    /// Projected daily cost.
    pub daily_cost: f64,
}

/// Result of [`PodLifecycleManager::create`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// A pod was provisioned.
    Created(Sourced<Pod>),
    /// Dry-run: the projection, with no remote mutation performed.
    DryRun(DryRunReport),
}

/// Result of [`PodLifecycleManager::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// A terminate call was issued and accepted.
    Terminated,
    /// The pod was already in a terminal state (or gone); nothing to do.
    AlreadyTerminated,
}

/// Lifecycle operations over the hybrid client.
#[derive(Debug)]
pub struct PodLifecycleManager<'a, A, C> {
    client: &'a HybridClient<A, C>,
}

impl<'a, A: Backend, C: Backend> PodLifecycleManager<'a, A, C> {
    /// Manager over the given client.
    #[must_use]
    pub fn new(client: &'a HybridClient<A, C>) -> Self {
        Self { client }
    }

    /// Provision a pod from the cheapest offering matching the spec.
    ///
    /// In dry-run mode the projection is computed and returned without any
    /// remote mutation — the create endpoint is never called.
    ///
    /// # Errors
    ///
    /// [`ManagerError::InvalidSpec`] for an unrequestable spec,
    /// [`ManagerError::ResourceUnavailable`] when nothing matches, and
    /// transport errors from the actual create call.
    pub async fn create(&self, spec: &PodSpec, dry_run: bool) -> ManagerResult<CreateOutcome> {
        spec.validate()?;

        let criteria = FindCriteria {
            gpu_type: Some(spec.gpu_type),
            provider: spec.provider.clone(),
            region: spec.region.clone(),
            min_available: spec.gpu_count,
            max_cost: spec.max_cost_per_hour,
            sort_by: SortKey::Cost,
            descending: false,
            ..FindCriteria::default()
        };
        let offerings = ResourceFinder::new(self.client).find(&criteria).await?;
        let Some(cheapest) = offerings.value.into_iter().next() else {
            return Err(ManagerError::unavailable(describe_request(spec)));
        };

        let pod_name = spec.effective_name();
        let hourly_cost = cheapest.cost_per_hour * f64::from(spec.gpu_count);

        if dry_run {
            debug!(pod_name, offering = %cheapest.id, "dry run, skipping remote create");
            return Ok(CreateOutcome::DryRun(DryRunReport {
                pod_name,
                hourly_cost,
                daily_cost: hourly_cost * 24.0,
                offering: cheapest,
            }));
        }

        let request = CreatePodRequest {
            name: pod_name,
            gpu_type: spec.gpu_type,
            gpu_count: spec.gpu_count,
            offering_id: Some(cheapest.id.clone()),
            region: spec.region.clone().or_else(|| Some(cheapest.region.clone())),
            image: spec.image.clone(),
            disk_gb: spec.disk_gb,
            env: spec.env.clone(),
            cost_per_hour: Some(hourly_cost),
        };
        let pod = self.client.create_pod(&request).await?;
        info!(
            id = %pod.value.id,
            name = %pod.value.name,
            authoritative = pod.is_authoritative(),
            "pod created"
        );
        Ok(CreateOutcome::Created(pod))
    }

    /// Current state of a pod, re-fetched from the external system.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors.
    pub async fn status(&self, id: &str) -> ManagerResult<Sourced<Pod>> {
        Ok(self.client.get_pod(id).await?)
    }

    /// List pods, optionally only the non-terminal ones.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors.
    pub async fn list(&self, active_only: bool) -> ManagerResult<Sourced<Vec<Pod>>> {
        let mut pods = self.client.list_pods().await?;
        if active_only {
            pods.value.retain(|pod| !pod.status.is_terminal());
        }
        Ok(pods)
    }

    /// Up to `max_lines` of a pod's logs.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors.
    pub async fn logs(&self, id: &str, max_lines: u32) -> ManagerResult<Sourced<String>> {
        Ok(self.client.pod_logs(id, max_lines).await?)
    }

    /// Terminate a pod. Idempotent: a pod already in a terminal state (or
    /// no longer known to the external system) is a success without a
    /// remote terminate call.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors from the terminate call.
    pub async fn terminate(&self, id: &str) -> ManagerResult<TerminateOutcome> {
        match self.client.get_pod(id).await {
            Ok(pod) if pod.value.status.is_terminal() => {
                debug!(id, status = %pod.value.status, "pod already terminal");
                return Ok(TerminateOutcome::AlreadyTerminated);
            }
            Err(err) if matches!(err, podgrid_client::ClientError::NotFound { .. }) => {
                debug!(id, "pod unknown to the external system, treating as terminated");
                return Ok(TerminateOutcome::AlreadyTerminated);
            }
            // A live pod, or a status probe failure: issue the terminate
            // call either way.
            Ok(_) | Err(_) => {}
        }

        self.client.terminate_pod(id).await?;
        info!(id, "pod terminated");
        Ok(TerminateOutcome::Terminated)
    }

    /// Connection command string for a running pod.
    ///
    /// Never opens a session; callers paste or exec the returned command.
    ///
    /// # Errors
    ///
    /// [`ManagerError::NotRunning`] unless the pod is running,
    /// [`ManagerError::SshUnavailable`] when it has no recorded address.
    pub async fn ssh_command(&self, id: &str) -> ManagerResult<String> {
        let pod = self.status(id).await?.into_inner();
        if pod.status != podgrid_proto::PodStatus::Running {
            return Err(ManagerError::NotRunning {
                id: id.to_string(),
                status: pod.status,
            });
        }
        let target = pod.ssh_connection.ok_or_else(|| ManagerError::SshUnavailable {
            id: id.to_string(),
        })?;
        if target.starts_with("ssh ") {
            Ok(target)
        } else {
            Ok(format!("ssh {target}"))
        }
    }
}

fn describe_request(spec: &PodSpec) -> String {
    let mut description = format!("{}x {}", spec.gpu_count, spec.gpu_type);
    if let Some(max) = spec.max_cost_per_hour {
        description.push_str(&format!(" under ${max:.2}/hr"));
    }
    if let Some(region) = &spec.region {
        description.push_str(&format!(" in {region}"));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_client::{
        ClientError, ClientResult, OfferingQuery, RetryPolicy, RetryingTransport,
    };
    use podgrid_proto::{GpuType, PodStatus};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scriptable backend: a fixed offering list, a fixed pod table, and
    /// per-operation call counters.
    #[derive(Default)]
    struct ScriptedBackend {
        offerings: Vec<ResourceOffering>,
        pods: Vec<Pod>,
        list_calls: AtomicU32,
        create_calls: AtomicU32,
        status_calls: AtomicU32,
        terminate_calls: AtomicU32,
    }

    fn offering(id: &str, gpu_type: GpuType, cost: f64, available: u32) -> ResourceOffering {
        ResourceOffering {
            id: id.to_string(),
            gpu_type,
            gpu_count: available.max(1),
            available_count: available,
            total_count: available.max(1),
            cost_per_hour: cost,
            provider: "Datacrunch".into(),
            region: "FIN-01".into(),
        }
    }

    fn pod(id: &str, status: PodStatus, ssh: Option<&str>) -> Pod {
        Pod {
            id: id.to_string(),
            name: format!("{id}-name"),
            gpu_type: GpuType::H100_80GB,
            gpu_count: 1,
            status,
            cost_per_hour: 2.0,
            created_at: chrono::Utc::now(),
            started_at: None,
            stopped_at: None,
            ssh_connection: ssh.map(ToString::to_string),
            provider: "Datacrunch".into(),
            region: "FIN-01".into(),
            image: None,
            disk_gb: None,
            env: BTreeMap::new(),
        }
    }

    impl Backend for ScriptedBackend {
        async fn list_offerings(
            &self,
            _query: &OfferingQuery,
        ) -> ClientResult<Vec<ResourceOffering>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.offerings.clone())
        }

        async fn list_gpu_types(&self) -> ClientResult<Vec<String>> {
            Ok(vec![])
        }

        async fn create_pod(&self, request: &CreatePodRequest) -> ClientResult<Pod> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let mut created = pod("pod-new", PodStatus::Pending, None);
            created.name.clone_from(&request.name);
            created.gpu_type = request.gpu_type;
            created.gpu_count = request.gpu_count;
            created.cost_per_hour = request.cost_per_hour.unwrap_or(0.0);
            Ok(created)
        }

        async fn get_pod(&self, id: &str) -> ClientResult<Pod> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.pods
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| ClientError::not_found(format!("pod {id}")))
        }

        async fn list_pods(&self) -> ClientResult<Vec<Pod>> {
            Ok(self.pods.clone())
        }

        async fn pod_logs(&self, _id: &str, _max_lines: u32) -> ClientResult<String> {
            Ok("log line".into())
        }

        async fn terminate_pod(&self, _id: &str) -> ClientResult<()> {
            self.terminate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn hybrid(cli: ScriptedBackend) -> HybridClient<ScriptedBackend, ScriptedBackend> {
        HybridClient::new(
            None,
            cli,
            RetryingTransport::new(RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                multiplier: 2.0,
                jitter: Duration::ZERO,
                max_delay: Duration::from_millis(2),
            }),
        )
    }

    fn spec(gpu_type: GpuType, count: u32) -> PodSpec {
        PodSpec::new(gpu_type, count)
    }

    #[tokio::test]
    async fn dry_run_never_calls_create() {
        let backend = ScriptedBackend {
            offerings: vec![
                offering("cfg-cheap", GpuType::H100_80GB, 2.5, 4),
                offering("cfg-pricey", GpuType::H100_80GB, 9.0, 4),
            ],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        let outcome = manager
            .create(&spec(GpuType::H100_80GB, 2), true)
            .await
            .expect("dry run");

        let CreateOutcome::DryRun(report) = outcome else {
            panic!("expected dry run outcome");
        };
        assert_eq!(report.offering.id, "cfg-cheap");
        assert!((report.hourly_cost - 5.0).abs() < 1e-9);
        assert!((report.daily_cost - 120.0).abs() < 1e-9);

        let cli = client.cli_backend();
        assert_eq!(cli.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(cli.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_provisions_cheapest_offering() {
        let backend = ScriptedBackend {
            offerings: vec![
                offering("cfg-pricey", GpuType::H100_80GB, 9.0, 4),
                offering("cfg-cheap", GpuType::H100_80GB, 2.5, 4),
            ],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        let outcome = manager
            .create(&spec(GpuType::H100_80GB, 2), false)
            .await
            .expect("create");

        let CreateOutcome::Created(created) = outcome else {
            panic!("expected created outcome");
        };
        assert_eq!(created.value.status, PodStatus::Pending);
        assert!((created.value.cost_per_hour - 5.0).abs() < 1e-9);
        assert_eq!(client.cli_backend().create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_with_no_match_is_resource_unavailable() {
        let backend = ScriptedBackend {
            offerings: vec![offering("cfg", GpuType::RTX_4090, 0.5, 1)],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        let mut wanted = spec(GpuType::H100_80GB, 2);
        wanted.max_cost_per_hour = Some(5.0);
        let err = manager.create(&wanted, false).await.expect_err("must fail");
        assert!(matches!(err, ManagerError::ResourceUnavailable { .. }));
        assert!(err.to_string().contains("2x H100_80GB under $5.00/hr"));
    }

    #[tokio::test]
    async fn create_rejects_invalid_spec_before_any_remote_call() {
        let client = hybrid(ScriptedBackend::default());
        let manager = PodLifecycleManager::new(&client);

        let err = manager
            .create(&spec(GpuType::H100_80GB, 0), false)
            .await
            .expect_err("must fail");
        assert!(matches!(err, ManagerError::InvalidSpec(_)));
        assert_eq!(client.cli_backend().list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminate_skips_remote_call_for_terminal_pod() {
        let backend = ScriptedBackend {
            pods: vec![pod("pod-done", PodStatus::Terminated, None)],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        let outcome = manager.terminate("pod-done").await.expect("terminate");
        assert_eq!(outcome, TerminateOutcome::AlreadyTerminated);
        assert_eq!(client.cli_backend().terminate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminate_unknown_pod_is_idempotent_success() {
        let client = hybrid(ScriptedBackend::default());
        let manager = PodLifecycleManager::new(&client);

        let outcome = manager.terminate("pod-gone").await.expect("terminate");
        assert_eq!(outcome, TerminateOutcome::AlreadyTerminated);
    }

    #[tokio::test]
    async fn terminate_running_pod_issues_remote_call() {
        let backend = ScriptedBackend {
            pods: vec![pod("pod-live", PodStatus::Running, None)],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        let outcome = manager.terminate("pod-live").await.expect("terminate");
        assert_eq!(outcome, TerminateOutcome::Terminated);
        assert_eq!(client.cli_backend().terminate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_active_only_drops_terminal_pods() {
        let backend = ScriptedBackend {
            pods: vec![
                pod("pod-live", PodStatus::Running, None),
                pod("pod-done", PodStatus::Terminated, None),
                pod("pod-new", PodStatus::Pending, None),
            ],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        let all = manager.list(false).await.expect("list all");
        assert_eq!(all.value.len(), 3);
        let active = manager.list(true).await.expect("list active");
        let ids: Vec<_> = active.value.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["pod-live", "pod-new"]);
    }

    #[tokio::test]
    async fn ssh_command_requires_running_pod_with_address() {
        let backend = ScriptedBackend {
            pods: vec![
                pod("pod-live", PodStatus::Running, Some("root@pod-live.example.net")),
                pod("pod-new", PodStatus::Pending, None),
                pod("pod-bare", PodStatus::Running, None),
            ],
            ..ScriptedBackend::default()
        };
        let client = hybrid(backend);
        let manager = PodLifecycleManager::new(&client);

        assert_eq!(
            manager.ssh_command("pod-live").await.expect("ssh"),
            "ssh root@pod-live.example.net"
        );
        assert!(matches!(
            manager.ssh_command("pod-new").await.expect_err("pending"),
            ManagerError::NotRunning { .. }
        ));
        assert!(matches!(
            manager.ssh_command("pod-bare").await.expect_err("no address"),
            ManagerError::SshUnavailable { .. }
        ));
    }
}
