//! Error taxonomy for remote control-plane calls.
//!
//! Every failure from either transport path (structured API or external CLI)
//! is classified into one of these variants. Classification decides retry
//! behavior: only [`ClientError::is_transient`] errors are retried, and
//! authentication / invalid-input errors also suppress the CLI fallback.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors from talking to the external provisioning system.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials missing, expired or rejected. Never retried, never
    /// falls back to the CLI path (the CLI shares the same credentials).
    #[error("authentication failed: {message}")]
    Authentication {
        /// What the remote end said.
        message: String,
    },

    /// The external system asked us to back off. Retried.
    #[error("rate limited: {message}")]
    RateLimited {
        /// What the remote end said.
        message: String,
    },

    /// A single attempt exceeded the per-attempt time budget. Retried.
    #[error("timeout: {operation} did not complete within {timeout_secs} seconds")]
    Timeout {
        /// The operation that timed out, tagged with its transport path.
        operation: String,
        /// The per-attempt budget in seconds.
        timeout_secs: u64,
    },

    /// Network-level failure (refused, reset, DNS, 5xx). Retried.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// The requested resource does not exist. Not retried.
    #[error("not found: {resource}")]
    NotFound {
        /// What was asked for.
        resource: String,
    },

    /// The request itself was malformed or unprocessable. Not retried,
    /// and never falls back — the CLI would reject it for the same reason.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the request.
        message: String,
    },

    /// The external CLI exited non-zero without a recognizable error text.
    /// Not retried: a deterministic usage failure repeated with backoff
    /// only amplifies load on the external system.
    #[error("command failed: {command} exited with {exit_code}: {stderr}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit code, or -1 when the process could not be launched.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The CLI's tabular output could not be interpreted (missing required
    /// columns, no table at all). Not retried.
    #[error("unparseable output: {message}")]
    UnparseableOutput {
        /// What the parser was missing.
        message: String,
    },

    /// HTTP-level transport fault outside the status-code mapping
    /// (body decode, protocol error). Retried.
    #[error("http error: {message}")]
    Http {
        /// Description of the fault.
        message: String,
    },

    /// A transient error survived every allowed attempt.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The final transient error.
        last: Box<ClientError>,
    },

    /// Both transport paths failed. The API error is the primary message;
    /// the CLI failure is attached as context.
    #[error("api error: {api} (cli fallback also failed: {cli})")]
    FallbackFailed {
        /// What the API path reported.
        api: Box<ClientError>,
        /// What the CLI path reported afterwards.
        cli: Box<ClientError>,
    },
}

impl ClientError {
    /// Creates an `Authentication` error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a `RateLimited` error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_secs,
        }
    }

    /// Creates a `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a `CommandFailed` error.
    #[must_use]
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Creates an `UnparseableOutput` error.
    #[must_use]
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self::UnparseableOutput {
            message: message.into(),
        }
    }

    /// Creates an `Http` error.
    #[must_use]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Wraps the final transient error after attempts ran out.
    #[must_use]
    pub fn retry_exhausted(attempts: u32, last: Self) -> Self {
        Self::RetryExhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Combines the API-path error with the CLI-path error that followed.
    #[must_use]
    pub fn fallback_failed(api: Self, cli: Self) -> Self {
        Self::FallbackFailed {
            api: Box::new(api),
            cli: Box::new(cli),
        }
    }

    /// Whether a retry has a chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Connection { .. }
                | Self::Http { .. }
        )
    }

    /// Whether this is an authentication failure.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Whether this error must surface immediately instead of triggering
    /// the CLI fallback.
    #[must_use]
    pub fn bypasses_fallback(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::InvalidInput { .. }
        )
    }
}
