//! Provisioned pods and pod specifications.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gpu::GpuType;

/// Lifecycle status of a pod.
///
/// Status is only ever learned by re-querying the external system; nothing
/// in this workspace infers a transition locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodStatus {
    /// Requested, not yet running.
    Pending,
    /// Up and billable.
    Running,
    /// The external system gave up on it.
    Failed,
    /// Shut down, deliberately or otherwise.
    Terminated,
    /// The external system reported something we do not recognize.
    Unknown,
}

impl PodStatus {
    /// Check if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    /// Whether the external system could legally move a pod from `self`
    /// to `to`.
    ///
    /// `pending -> running -> terminated`, with `failed` reachable from
    /// both non-terminal states. `Unknown` is compatible with anything,
    /// since it means we could not read the current state.
    #[must_use]
    pub const fn can_transition(&self, to: Self) -> bool {
        match (self, to) {
            (Self::Unknown, _) | (_, Self::Unknown) => true,
            (Self::Pending, Self::Running | Self::Failed | Self::Terminated)
            | (Self::Running, Self::Failed | Self::Terminated) => true,
            _ => false,
        }
    }

    /// Normalize a status string from either transport into the enum.
    ///
    /// The external tool's CLI reports `creating`/`stopping`/`stopped`
    /// where the API says `pending`/`terminated`; both forms fold onto the
    /// same value here.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "pending" | "creating" | "provisioning" | "starting" => Self::Pending,
            "running" | "active" => Self::Running,
            "failed" | "error" => Self::Failed,
            "terminated" | "stopped" | "stopping" | "cancelled" => Self::Terminated,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A provisioned compute instance tracked by the external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    /// Identifier assigned by the external system. Opaque.
    pub id: String,
    /// Human-chosen pod name.
    pub name: String,
    /// Requested GPU type.
    pub gpu_type: GpuType,
    /// Requested GPU count.
    pub gpu_count: u32,
    /// Current lifecycle status as last re-queried.
    pub status: PodStatus,
    /// Cost per hour in USD for the whole pod.
    pub cost_per_hour: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the pod actually came up, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the pod stopped, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    /// SSH connection target (`user@host [options]`), once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_connection: Option<String>,
    /// Provider running the pod.
    pub provider: String,
    /// Region the pod landed in.
    pub region: String,
    /// Container image, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Disk size in GB, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u32>,
    /// Environment variables requested at creation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Pod {
    /// Hours this pod has been (or was) running.
    #[must_use]
    pub fn runtime_hours(&self) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let end = self.stopped_at.unwrap_or_else(Utc::now);
        let secs = (end - started).num_seconds().max(0);
        secs as f64 / 3600.0
    }

    /// Accumulated cost in USD, derived from runtime and hourly rate.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.runtime_hours() * self.cost_per_hour
    }
}

/// Error returned when a pod specification fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// The GPU type is not one we can request.
    #[error("gpu type {0} cannot be provisioned")]
    UnrecognizedGpu(String),
    /// GPU count must be at least one.
    #[error("gpu count must be at least 1, got {0}")]
    ZeroGpus(u32),
    /// A non-positive cost ceiling can never match an offering.
    #[error("cost ceiling must be positive, got {0}")]
    NonPositiveCeiling(f64),
}

/// What a caller wants provisioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// GPU type to request.
    pub gpu_type: GpuType,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Pod name; generated when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Preferred region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Preferred provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Container image to boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Disk size in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u32>,
    /// Environment variables to inject.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Reject offerings above this hourly cost per instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_per_hour: Option<f64>,
}

impl PodSpec {
    /// Minimal spec for a GPU type and count; everything else defaulted.
    #[must_use]
    pub fn new(gpu_type: GpuType, gpu_count: u32) -> Self {
        Self {
            gpu_type,
            gpu_count,
            name: None,
            region: None,
            provider: None,
            image: None,
            disk_gb: None,
            env: BTreeMap::new(),
            max_cost_per_hour: None,
        }
    }

    /// Check the spec is requestable.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] when the GPU type is `Unknown`, the count is
    /// zero, or a cost ceiling is non-positive.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.gpu_type == GpuType::Unknown {
            return Err(SpecError::UnrecognizedGpu(self.gpu_type.to_string()));
        }
        if self.gpu_count == 0 {
            return Err(SpecError::ZeroGpus(self.gpu_count));
        }
        if let Some(ceiling) = self.max_cost_per_hour {
            if ceiling <= 0.0 {
                return Err(SpecError::NonPositiveCeiling(ceiling));
            }
        }
        Ok(())
    }

    /// The pod name to use: the requested one, or a generated `pod-<hex>`.
    #[must_use]
    pub fn effective_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("pod-{}", &suffix[..8])
        })
    }
}
