//! Discoverable GPU offerings.

use serde::{Deserialize, Serialize};

use crate::gpu::GpuType;

/// One discoverable, not-yet-provisioned GPU configuration.
///
/// An offering is an immutable snapshot from a single discovery query. It
/// has no identity beyond its configuration id, which is the opaque token
/// the external system expects back when provisioning from this offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOffering {
    /// Opaque configuration id used to request provisioning.
    pub id: String,
    /// GPU type on offer.
    pub gpu_type: GpuType,
    /// GPUs per instance of this configuration.
    pub gpu_count: u32,
    /// Instances currently available.
    pub available_count: u32,
    /// Total instances the provider operates for this configuration.
    pub total_count: u32,
    /// Cost per hour in USD, per instance.
    pub cost_per_hour: f64,
    /// Provider name (normalized).
    pub provider: String,
    /// Region or location string as reported by the provider.
    pub region: String,
}

impl ResourceOffering {
    /// Percentage of this configuration currently in use.
    ///
    /// Returns `0.0` when the provider reports no capacity at all.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        let in_use = self.total_count.saturating_sub(self.available_count);
        f64::from(in_use) / f64::from(self.total_count) * 100.0
    }

    /// Whether this looks like a placeholder entry rather than real capacity.
    ///
    /// Zero-cost offerings are how some providers pad their listings; they
    /// are excluded from discovery unless explicitly requested.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.cost_per_hour <= f64::EPSILON
    }
}
