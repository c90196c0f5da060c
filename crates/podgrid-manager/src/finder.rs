//! Filtering, sorting and comparison of GPU offerings.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use podgrid_client::{Backend, HybridClient, OfferingQuery, Sourced};
use podgrid_proto::{GpuType, ResourceOffering};

use crate::error::ManagerResult;

/// Hours in a billing day, used for daily-cost projections.
const HOURS_PER_DAY: f64 = 24.0;

/// Sort key for discovery results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Hourly cost (the default).
    #[default]
    Cost,
    /// Available instance count.
    Availability,
    /// Provider name.
    Provider,
    /// GPU type.
    GpuType,
}

/// Discovery filters plus result ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct FindCriteria {
    /// Exact GPU type to match.
    pub gpu_type: Option<GpuType>,
    /// Exact provider to match (case-insensitive).
    pub provider: Option<String>,
    /// Preferred region.
    pub region: Option<String>,
    /// Minimum available count.
    pub min_available: u32,
    /// Inclusive lower cost bound.
    pub min_cost: Option<f64>,
    /// Inclusive upper cost bound.
    pub max_cost: Option<f64>,
    /// Whether zero-cost offerings are kept. They are placeholder/test
    /// entries, not real availability, so the default is off.
    pub include_free: bool,
    /// Sort key.
    pub sort_by: SortKey,
    /// Sort direction.
    pub descending: bool,
}

impl Default for FindCriteria {
    fn default() -> Self {
        Self {
            gpu_type: None,
            provider: None,
            region: None,
            min_available: 1,
            min_cost: None,
            max_cost: None,
            include_free: false,
            sort_by: SortKey::Cost,
            descending: false,
        }
    }
}

impl FindCriteria {
    /// Criteria matching one GPU type, everything else defaulted.
    #[must_use]
    pub fn for_gpu(gpu_type: GpuType) -> Self {
        Self {
            gpu_type: Some(gpu_type),
            ..Self::default()
        }
    }

    fn matches(&self, offering: &ResourceOffering) -> bool {
        if let Some(gpu_type) = self.gpu_type {
            if offering.gpu_type != gpu_type {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if !offering.provider.eq_ignore_ascii_case(provider) {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if !offering.region.eq_ignore_ascii_case(region) {
                return false;
            }
        }
        if offering.available_count < self.min_available {
            return false;
        }
        if !self.include_free && offering.is_free() {
            return false;
        }
        if let Some(min) = self.min_cost {
            if offering.cost_per_hour < min {
                return false;
            }
        }
        if let Some(max) = self.max_cost {
            if offering.cost_per_hour > max {
                return false;
            }
        }
        true
    }
}

/// The cheapest matching offering for one GPU type, with a derived daily
/// cost projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuQuote {
    /// The cheapest matching offering.
    pub offering: ResourceOffering,
    /// `cost_per_hour * 24`.
    pub daily_cost: f64,
}

/// Sort offerings in place by the chosen key.
///
/// Ties are always broken by provider name, then configuration id, in
/// ascending order — regardless of the requested direction — so equal-key
/// results have one deterministic order.
pub fn sort_offerings(offerings: &mut [ResourceOffering], key: SortKey, descending: bool) {
    offerings.sort_by(|a, b| {
        let primary = match key {
            SortKey::Cost => a
                .cost_per_hour
                .partial_cmp(&b.cost_per_hour)
                .unwrap_or(std::cmp::Ordering::Equal),
            SortKey::Availability => a.available_count.cmp(&b.available_count),
            SortKey::Provider => a.provider.cmp(&b.provider),
            SortKey::GpuType => a.gpu_type.cmp(&b.gpu_type),
        };
        let primary = if descending { primary.reverse() } else { primary };
        primary
            .then_with(|| a.provider.cmp(&b.provider))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Discovery over the hybrid client.
#[derive(Debug)]
pub struct ResourceFinder<'a, A, C> {
    client: &'a HybridClient<A, C>,
}

impl<'a, A: Backend, C: Backend> ResourceFinder<'a, A, C> {
    /// Finder over the given client.
    #[must_use]
    pub fn new(client: &'a HybridClient<A, C>) -> Self {
        Self { client }
    }

    /// Discover offerings matching the criteria, ordered per the criteria.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors from the hybrid client.
    pub async fn find(
        &self,
        criteria: &FindCriteria,
    ) -> ManagerResult<Sourced<Vec<ResourceOffering>>> {
        let query = OfferingQuery {
            gpu_type: criteria.gpu_type,
            regions: criteria.region.iter().cloned().collect(),
            min_gpu_count: None,
        };

        let listed = self.client.list_offerings(&query).await?;
        let origin = listed.origin;
        let mut offerings: Vec<ResourceOffering> = listed
            .into_inner()
            .into_iter()
            .filter(|offering| criteria.matches(offering))
            .collect();
        sort_offerings(&mut offerings, criteria.sort_by, criteria.descending);

        debug!(count = offerings.len(), ?origin, "discovery finished");
        Ok(Sourced { value: offerings, origin })
    }

    /// Compare GPU types by their cheapest matching offering.
    ///
    /// Runs one `find` per type with the template criteria; a type with no
    /// matching offering is omitted from the result, never represented as
    /// a zero-cost entry.
    ///
    /// # Errors
    ///
    /// Propagates classified transport errors from the hybrid client.
    pub async fn compare(
        &self,
        gpu_types: &[GpuType],
        template: &FindCriteria,
    ) -> ManagerResult<BTreeMap<GpuType, GpuQuote>> {
        let mut quotes = BTreeMap::new();
        for &gpu_type in gpu_types {
            let criteria = FindCriteria {
                gpu_type: Some(gpu_type),
                sort_by: SortKey::Cost,
                descending: false,
                ..template.clone()
            };
            let offerings = self.find(&criteria).await?.into_inner();
            if let Some(cheapest) = offerings.into_iter().next() {
                quotes.insert(
                    gpu_type,
                    GpuQuote {
                        daily_cost: cheapest.cost_per_hour * HOURS_PER_DAY,
                        offering: cheapest,
                    },
                );
            }
        }
        Ok(quotes)
    }
}
