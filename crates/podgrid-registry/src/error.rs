//! Error types for registry operations.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors from the persisted pod registry.
///
/// All of these are local validation or IO conditions; none are retried.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A pod with this name is already configured.
    #[error("pod '{name}' already exists")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// No pod with this name is configured.
    #[error("pod '{name}' not found")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// No explicit pod was given and no active pod is set.
    #[error("no active pod configured; run 'pod setup' or pass a pod name")]
    NoActivePod,

    /// The reachability probe failed.
    #[error("pod target '{target}' unreachable within {timeout_secs} seconds")]
    Unreachable {
        /// The SSH target that was probed.
        target: String,
        /// The probe time budget.
        timeout_secs: u64,
    },

    /// The SSH target string is malformed.
    #[error("invalid ssh target: {message}")]
    InvalidSshTarget {
        /// What was wrong with it.
        message: String,
    },

    /// The persisted document is structurally unusable (unsupported
    /// version, violated invariant).
    #[error("registry corrupt: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Filesystem failure reading or writing the registry.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RegistryError {
    /// Creates a `DuplicateName` error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an `Unreachable` error.
    #[must_use]
    pub fn unreachable(target: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Unreachable {
            target: target.into(),
            timeout_secs,
        }
    }

    /// Creates an `InvalidSshTarget` error.
    #[must_use]
    pub fn invalid_ssh_target(message: impl Into<String>) -> Self {
        Self::InvalidSshTarget {
            message: message.into(),
        }
    }

    /// Creates a `Corrupt` error.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            RegistryError::duplicate("gpu-box").to_string(),
            "pod 'gpu-box' already exists"
        );
        assert_eq!(
            RegistryError::not_found("gone").to_string(),
            "pod 'gone' not found"
        );
        assert_eq!(
            RegistryError::unreachable("root@host", 10).to_string(),
            "pod target 'root@host' unreachable within 10 seconds"
        );
        assert!(RegistryError::NoActivePod.to_string().contains("no active pod"));
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RegistryError = io.into();
        assert!(matches!(err, RegistryError::Io(_)));
    }
}
