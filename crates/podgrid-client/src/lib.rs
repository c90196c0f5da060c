//! # podgrid-client
//!
//! Resilient hybrid client for the external GPU provisioning system.
//!
//! The external system exposes a structured API and a human-oriented CLI,
//! and neither is reliable on its own: the API rate-limits and times out,
//! the CLI's table output changes shape between versions. This crate
//! unifies both behind one typed interface:
//!
//! - [`retry`]: exponential-backoff engine applied uniformly to every
//!   remote call, with a fixed per-attempt timeout.
//! - [`api`]: the structured API path (JSON over HTTPS, bearer auth).
//! - [`fallback`] + [`table`]: the CLI path — subprocess invocation plus
//!   header-indexed parsing of tabular output.
//! - [`client`]: the [`HybridClient`] that prefers the API and falls back
//!   to the CLI, tagging every result with its transport origin.
//! - [`error`]: the shared failure taxonomy that drives retry and
//!   fallback decisions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod error;
pub mod fallback;
pub mod retry;
pub mod table;

pub use api::{ApiClient, ApiCredentials, DEFAULT_API_BASE_URL};
pub use client::{Backend, CreatePodRequest, DataOrigin, HybridClient, OfferingQuery, Sourced};
pub use error::{ClientError, ClientResult};
pub use fallback::{PrimeCli, DEFAULT_PROGRAM};
pub use retry::{NoopObserver, RetryObserver, RetryPolicy, RetryingTransport, ATTEMPT_TIMEOUT};

/// The default hybrid client type: structured API over the external CLI.
pub type DefaultClient = HybridClient<ApiClient, PrimeCli>;

/// Build the default hybrid client from ambient credentials.
///
/// API credentials are discovered from the environment; when none are
/// found every operation uses the CLI path directly.
#[must_use]
pub fn default_client(policy: RetryPolicy) -> DefaultClient {
    let api = ApiCredentials::discover().map(ApiClient::new);
    HybridClient::new(api, PrimeCli::default(), RetryingTransport::new(policy))
}
