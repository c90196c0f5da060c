//! GPU type enumeration and label normalization.
//!
//! Providers spell the same card many ways ("NVIDIA H100 80GB HBM3",
//! "H100-80G", a truncated "H100 8…" table cell). [`GpuType::from_label`]
//! folds all of them onto one canonical value so filtering and comparison
//! work across providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recognized GPU configurations, spelled the way the provisioning API
/// spells them.
#[allow(non_camel_case_types)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum GpuType {
    /// NVIDIA H100 with 80 GiB HBM.
    H100_80GB,
    /// NVIDIA H100 with 40 GiB HBM.
    H100_40GB,
    /// NVIDIA A100 with 80 GiB HBM.
    A100_80GB,
    /// NVIDIA A100 with 40 GiB HBM.
    A100_40GB,
    /// NVIDIA V100 with 32 GiB HBM.
    V100_32GB,
    /// NVIDIA V100 with 16 GiB HBM.
    V100_16GB,
    /// NVIDIA GeForce RTX 4090.
    RTX_4090,
    /// NVIDIA GeForce RTX 4080.
    RTX_4080,
    /// NVIDIA GeForce RTX 3090.
    RTX_3090,
    /// NVIDIA RTX A6000 workstation card.
    RTX_A6000,
    /// NVIDIA RTX A5000 workstation card.
    RTX_A5000,
    /// NVIDIA RTX A4000 workstation card.
    RTX_A4000,
    /// NVIDIA L4.
    L4,
    /// NVIDIA L40.
    L40,
    /// NVIDIA L40S.
    L40S,
    /// NVIDIA T4.
    T4,
    /// CPU-only configuration (no accelerator).
    CPU,
    /// Anything the label mapper could not identify.
    Unknown,
}

/// Error returned when parsing a canonical GPU type string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized gpu type: {0}")]
pub struct ParseGpuTypeError(String);

impl GpuType {
    /// Every recognized type, in canonical order.
    pub const ALL: &'static [Self] = &[
        Self::H100_80GB,
        Self::H100_40GB,
        Self::A100_80GB,
        Self::A100_40GB,
        Self::V100_32GB,
        Self::V100_16GB,
        Self::RTX_4090,
        Self::RTX_4080,
        Self::RTX_3090,
        Self::RTX_A6000,
        Self::RTX_A5000,
        Self::RTX_A4000,
        Self::L4,
        Self::L40,
        Self::L40S,
        Self::T4,
        Self::CPU,
    ];

    /// The canonical string form (`"H100_80GB"`, `"RTX_4090"`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::H100_80GB => "H100_80GB",
            Self::H100_40GB => "H100_40GB",
            Self::A100_80GB => "A100_80GB",
            Self::A100_40GB => "A100_40GB",
            Self::V100_32GB => "V100_32GB",
            Self::V100_16GB => "V100_16GB",
            Self::RTX_4090 => "RTX_4090",
            Self::RTX_4080 => "RTX_4080",
            Self::RTX_3090 => "RTX_3090",
            Self::RTX_A6000 => "RTX_A6000",
            Self::RTX_A5000 => "RTX_A5000",
            Self::RTX_A4000 => "RTX_A4000",
            Self::L4 => "L4",
            Self::L40 => "L40",
            Self::L40S => "L40S",
            Self::T4 => "T4",
            Self::CPU => "CPU",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Map a free-form provider label onto a recognized type.
    ///
    /// Tries the canonical spelling first (with and without underscores),
    /// then falls back to substring heuristics. Truncated table cells
    /// (trailing `…`) are handled by the caller stripping the ellipsis;
    /// labels that match nothing map to [`GpuType::Unknown`], never an error.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let upper = label.trim().to_uppercase();
        if upper.is_empty() {
            return Self::Unknown;
        }

        let squashed = upper.replace(['_', '-', ' '], "");
        for gpu in Self::ALL {
            if gpu.as_str() == upper || gpu.as_str().replace('_', "") == squashed {
                return *gpu;
            }
        }

        if upper.contains("CPU") {
            return Self::CPU;
        }
        if upper.contains("H100") {
            return if upper.contains("40") {
                Self::H100_40GB
            } else {
                Self::H100_80GB
            };
        }
        if upper.contains("A100") {
            return if upper.contains("40") {
                Self::A100_40GB
            } else {
                Self::A100_80GB
            };
        }
        if upper.contains("V100") {
            return if upper.contains("32") {
                Self::V100_32GB
            } else {
                Self::V100_16GB
            };
        }
        if upper.contains("A6000") {
            return Self::RTX_A6000;
        }
        if upper.contains("A5000") {
            return Self::RTX_A5000;
        }
        if upper.contains("A4000") {
            return Self::RTX_A4000;
        }
        if upper.contains("L40S") {
            return Self::L40S;
        }
        if upper.contains("L40") {
            return Self::L40;
        }
        // Bare "L4" must not swallow "L40"/"L40S" labels.
        if squashed == "L4" || upper.starts_with("L4 ") || upper.ends_with(" L4") {
            return Self::L4;
        }
        if upper.contains("4090") {
            return Self::RTX_4090;
        }
        if upper.contains("4080") {
            return Self::RTX_4080;
        }
        if upper.contains("3090") {
            return Self::RTX_3090;
        }
        if squashed == "T4" || upper.starts_with("T4 ") || upper.ends_with(" T4") {
            return Self::T4;
        }

        Self::Unknown
    }
}

impl fmt::Display for GpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GpuType {
    type Err = ParseGpuTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|gpu| gpu.as_str() == upper)
            .copied()
            .ok_or_else(|| ParseGpuTypeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn canonical_roundtrip() {
        for gpu in GpuType::ALL {
            let parsed: GpuType = gpu.as_str().parse().expect("canonical form parses");
            assert_eq!(parsed, *gpu);
        }
    }

    #[test]
    fn from_str_rejects_garbage() {
        assert!("H200_TURBO".parse::<GpuType>().is_err());
        assert!("".parse::<GpuType>().is_err());
    }

    #[test_case("NVIDIA H100 80GB HBM3", GpuType::H100_80GB; "vendor h100")]
    #[test_case("H100-40G", GpuType::H100_40GB; "dashed h100 40")]
    #[test_case("a100_80gb", GpuType::A100_80GB; "lowercase a100")]
    #[test_case("V100 32GB", GpuType::V100_32GB; "spaced v100")]
    #[test_case("V100", GpuType::V100_16GB; "bare v100 defaults to 16")]
    #[test_case("RTX A6000", GpuType::RTX_A6000; "spaced a6000")]
    #[test_case("GeForce RTX 4090", GpuType::RTX_4090; "geforce 4090")]
    #[test_case("L40S", GpuType::L40S; "l40s exact")]
    #[test_case("L40", GpuType::L40; "l40 exact")]
    #[test_case("L4", GpuType::L4; "l4 exact")]
    #[test_case("T4", GpuType::T4; "t4 exact")]
    #[test_case("8x CPU", GpuType::CPU; "cpu node")]
    #[test_case("Gaudi2", GpuType::Unknown; "unrecognized")]
    #[test_case("", GpuType::Unknown; "empty")]
    fn label_mapping(label: &str, expected: GpuType) {
        assert_eq!(GpuType::from_label(label), expected);
    }

    #[test]
    fn serde_uses_canonical_spelling() {
        let json = serde_json::to_string(&GpuType::H100_80GB).expect("serialize");
        assert_eq!(json, "\"H100_80GB\"");
        let back: GpuType = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, GpuType::H100_80GB);
    }
}
