//! Error types for discovery and lifecycle operations.

use thiserror::Error;

use podgrid_client::ClientError;
use podgrid_proto::{PodStatus, SpecError};

/// Result type alias for manager operations.
pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

/// Errors from resource discovery and pod lifecycle management.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The pod specification failed validation. Local, never retried.
    #[error("invalid pod spec: {0}")]
    InvalidSpec(#[from] SpecError),

    /// No offering matches the request. Reported, not retried.
    #[error("no offering matches the request: {description}")]
    ResourceUnavailable {
        /// What was asked for.
        description: String,
    },

    /// An SSH command was requested for a pod that is not running.
    #[error("pod {id} is not running (status: {status})")]
    NotRunning {
        /// The pod id.
        id: String,
        /// Its current status.
        status: PodStatus,
    },

    /// The pod has no recorded network address to connect to.
    #[error("pod {id} has no ssh endpoint recorded")]
    SshUnavailable {
        /// The pod id.
        id: String,
    },

    /// A remote call failed; carries the transport classification.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ManagerError {
    /// Creates a `ResourceUnavailable` error.
    #[must_use]
    pub fn unavailable(description: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = ManagerError::unavailable("2x H100_80GB under $5.00/hr");
        assert_eq!(
            err.to_string(),
            "no offering matches the request: 2x H100_80GB under $5.00/hr"
        );

        let err = ManagerError::NotRunning {
            id: "pod-1".into(),
            status: PodStatus::Pending,
        };
        assert_eq!(err.to_string(), "pod pod-1 is not running (status: pending)");
    }

    #[test]
    fn client_errors_pass_through_transparently() {
        let err: ManagerError = ClientError::rate_limited("slow down").into();
        assert_eq!(err.to_string(), "rate limited: slow down");
    }
}
