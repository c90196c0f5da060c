//! CLI error type.

use thiserror::Error;

/// Errors surfaced by the CLI adapter.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command-line argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting failed.
    #[error("format error: {0}")]
    Format(String),

    /// A remote call failed.
    #[error(transparent)]
    Client(#[from] podgrid_client::ClientError),

    /// A discovery or lifecycle operation failed.
    #[error(transparent)]
    Manager(#[from] podgrid_manager::ManagerError),

    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] podgrid_registry::RegistryError),

    /// IO error writing output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_display_transparently() {
        let err: CliError = podgrid_client::ClientError::rate_limited("slow down").into();
        assert_eq!(err.to_string(), "rate limited: slow down");

        let err: CliError = podgrid_registry::RegistryError::NoActivePod.into();
        assert!(err.to_string().contains("no active pod"));
    }

    #[test]
    fn invalid_argument_display() {
        let err = CliError::InvalidArgument("bad env var 'X'".into());
        assert_eq!(err.to_string(), "invalid argument: bad env var 'X'");
    }
}
