//! Named pod configurations and the single active-pod pointer.
//!
//! Every mutating operation is load -> mutate -> save against the atomic
//! [`ConfigStore`], so the registry file is consistent after each step and
//! the active-pod invariant holds after every mutation, including removal
//! of the currently active pod.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::ssh;
use crate::store::{ConfigStore, PodEntry};

/// Best-effort metadata recorded alongside a pod at setup time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodMetadata {
    /// Provider name.
    pub provider: Option<String>,
    /// Region name.
    pub region: Option<String>,
    /// GPU type label.
    pub gpu_type: Option<String>,
    /// GPU count.
    pub gpu_count: Option<u32>,
    /// Hourly cost in USD.
    pub cost_per_hour: Option<f64>,
    /// External pod id.
    pub pod_id: Option<String>,
    /// Initial status tag.
    pub status: Option<String>,
}

/// Input to [`ActivePodRegistry::setup`].
#[derive(Debug, Clone, PartialEq)]
pub struct SetupRequest {
    /// Unique pod name.
    pub name: String,
    /// Raw SSH target; normalized before storing.
    pub ssh_target: String,
    /// Whether to probe reachability before saving.
    pub test_connection: bool,
    /// Whether an unreachable probe aborts the setup. When false the
    /// entry is saved anyway and the report carries the warning.
    pub require_reachable: bool,
    /// Optional metadata to record.
    pub metadata: PodMetadata,
}

impl SetupRequest {
    /// Request with connection testing off and empty metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, ssh_target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ssh_target: ssh_target.into(),
            test_connection: false,
            require_reachable: false,
            metadata: PodMetadata::default(),
        }
    }
}

/// What [`ActivePodRegistry::setup`] recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupReport {
    /// The persisted entry.
    pub entry: PodEntry,
    /// Whether this pod became the active one (first configured pod).
    pub became_active: bool,
    /// Probe outcome; `None` when no probe was requested.
    pub reachable: Option<bool>,
}

/// Manager for the persisted pod registry and its active-pod pointer.
#[derive(Debug, Clone)]
pub struct ActivePodRegistry {
    store: ConfigStore,
}

impl ActivePodRegistry {
    /// Registry over the given store.
    #[must_use]
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Record a new pod configuration.
    ///
    /// The first configured pod becomes active; later setups never steal
    /// the pointer. When `test_connection` is set, the target is probed
    /// with a bounded timeout first.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] if the name exists,
    /// [`RegistryError::InvalidSshTarget`] for a malformed target, and
    /// [`RegistryError::Unreachable`] when the probe fails and the request
    /// demands reachability.
    pub async fn setup(&self, request: SetupRequest) -> RegistryResult<SetupReport> {
        let target = ssh::normalize_target(&request.ssh_target)?;
        let reachable = if request.test_connection {
            Some(ssh::probe(&target).await)
        } else {
            None
        };
        self.install(request, target, reachable)
    }

    fn install(
        &self,
        request: SetupRequest,
        target: String,
        reachable: Option<bool>,
    ) -> RegistryResult<SetupReport> {
        if reachable == Some(false) {
            if request.require_reachable {
                return Err(RegistryError::unreachable(
                    target,
                    ssh::PROBE_TIMEOUT.as_secs(),
                ));
            }
            warn!(
                name = %request.name,
                target = %target,
                "target unreachable, saving configuration anyway"
            );
        }

        let mut file = self.store.load()?;
        if file.pods.contains_key(&request.name) {
            return Err(RegistryError::duplicate(request.name));
        }

        let meta = request.metadata;
        let entry = PodEntry {
            name: request.name.clone(),
            ssh_command: target,
            provider: meta.provider.unwrap_or_else(|| "unknown".to_string()),
            region: meta.region.unwrap_or_else(|| "unknown".to_string()),
            gpu_type: meta.gpu_type.unwrap_or_else(|| "unknown".to_string()),
            gpu_count: meta.gpu_count.unwrap_or(1),
            cost_per_hour: meta.cost_per_hour.unwrap_or(0.0),
            created_at: Utc::now(),
            status: meta.status.unwrap_or_else(|| "unknown".to_string()),
            pod_id: meta.pod_id,
        };

        let became_active = file.active_pod.is_none();
        if became_active {
            file.active_pod = Some(request.name.clone());
        }
        file.pods.insert(request.name.clone(), entry.clone());
        self.store.save(&file)?;

        info!(name = %request.name, became_active, "pod configured");
        Ok(SetupReport {
            entry,
            became_active,
            reachable,
        })
    }

    /// Make `name` the active pod.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when no such pod is configured.
    pub fn switch(&self, name: &str) -> RegistryResult<()> {
        let mut file = self.store.load()?;
        if !file.pods.contains_key(name) {
            return Err(RegistryError::not_found(name));
        }
        file.active_pod = Some(name.to_string());
        self.store.save(&file)?;
        debug!(name, "active pod switched");
        Ok(())
    }

    /// Remove a pod configuration.
    ///
    /// Removing the active pod clears the pointer; it is never re-targeted
    /// and never left dangling.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when no such pod is configured.
    pub fn remove(&self, name: &str) -> RegistryResult<()> {
        let mut file = self.store.load()?;
        if file.pods.remove(name).is_none() {
            return Err(RegistryError::not_found(name));
        }
        if file.active_pod.as_deref() == Some(name) {
            file.active_pod = None;
            warn!(name, "removed the active pod, no pod is active now");
        }
        self.store.save(&file)?;
        Ok(())
    }

    /// Resolve which pod an operation targets.
    ///
    /// An explicit name wins (and must exist); otherwise the active pod.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] for an unknown explicit name,
    /// [`RegistryError::NoActivePod`] when nothing is targeted.
    pub fn resolve(&self, explicit: Option<&str>) -> RegistryResult<PodEntry> {
        let file = self.store.load()?;
        let name = match explicit {
            Some(name) => name.to_string(),
            None => file.active_pod.clone().ok_or(RegistryError::NoActivePod)?,
        };
        file.pods
            .get(&name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(name))
    }

    /// All configured pods, ordered by name.
    ///
    /// # Errors
    ///
    /// Propagates store IO failures.
    pub fn list(&self) -> RegistryResult<Vec<PodEntry>> {
        Ok(self.store.load()?.pods.into_values().collect())
    }

    /// One configured pod by name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when absent.
    pub fn get(&self, name: &str) -> RegistryResult<PodEntry> {
        self.store
            .load()?
            .pods
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(name))
    }

    /// The currently active pod's name, if any.
    ///
    /// # Errors
    ///
    /// Propagates store IO failures.
    pub fn active(&self) -> RegistryResult<Option<String>> {
        Ok(self.store.load()?.active_pod)
    }

    /// Refresh a pod's best-effort status tag (and external id).
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when absent.
    pub fn update_status(
        &self,
        name: &str,
        status: &str,
        pod_id: Option<&str>,
    ) -> RegistryResult<()> {
        let mut file = self.store.load()?;
        let entry = file
            .pods
            .get_mut(name)
            .ok_or_else(|| RegistryError::not_found(name))?;
        entry.status = status.to_string();
        if let Some(id) = pod_id {
            entry.pod_id = Some(id.to_string());
        }
        self.store.save(&file)?;
        Ok(())
    }

    /// Full SSH command string for a configured pod.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when absent.
    pub fn ssh_command(&self, name: &str) -> RegistryResult<String> {
        Ok(ssh::connection_command(&self.get(name)?.ssh_command))
    }
}
