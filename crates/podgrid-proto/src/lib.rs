//! # podgrid-proto
//!
//! Shared domain types for podgrid: GPU types, discoverable offerings,
//! provisioned pods and pod specifications.
//!
//! These types are the common vocabulary between the hybrid client (which
//! produces them from API responses or parsed CLI output), the resource
//! finder and lifecycle manager (which filter and act on them), and the
//! persisted registry (which stores a best-effort subset).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod gpu;
pub mod offering;
pub mod pod;

pub use gpu::GpuType;
pub use offering::ResourceOffering;
pub use pod::{Pod, PodSpec, PodStatus, SpecError};
