//! Exponential-backoff retry engine for remote calls.
//!
//! Both transport paths (API and CLI) run every call through
//! [`RetryingTransport::execute`]: each attempt is bounded by the fixed
//! [`ATTEMPT_TIMEOUT`], transient failures are retried with exponential
//! backoff plus jitter, and everything else surfaces immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Fixed per-attempt time budget, constant across the system.
///
/// A single underlying call may block at most this long before the attempt
/// is treated as a transient timeout.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff configuration. Pure data, no mutable state.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per subsequent retry.
    pub multiplier: f64,
    /// Upper bound for the random jitter added to each delay.
    pub jitter: Duration,
    /// Cap on the computed (pre-jitter) delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries. Useful for probes and tests.
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pre-jitter delay after the given failed attempt (1-based).
    ///
    /// `min(cap, base * multiplier^(attempt-1))`; non-decreasing in
    /// `attempt` for multipliers >= 1.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.base_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.delay_for_attempt(attempt) + Duration::from_millis(extra)
    }
}

/// Observer for retry diagnostics.
///
/// Purely informational: implementations must not (and cannot) influence
/// control flow. Default methods are no-ops so implementors opt into the
/// events they care about.
pub trait RetryObserver: Send + Sync {
    /// One attempt failed with the given classified error.
    fn on_attempt_failed(&self, _operation: &str, _attempt: u32, _error: &ClientError) {}

    /// The operation eventually succeeded after `attempts` attempts.
    fn on_success(&self, _operation: &str, _attempts: u32) {}

    /// Every allowed attempt failed transiently.
    fn on_exhausted(&self, _operation: &str, _attempts: u32, _error: &ClientError) {}
}

/// The default observer: records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// Applies a [`RetryPolicy`] uniformly to any single remote call.
#[derive(Clone)]
pub struct RetryingTransport {
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryingTransport {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryingTransport {
    /// Transport with the given policy and no observer.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attach a diagnostics observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The configured policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run
    /// out.
    ///
    /// Each attempt is bounded by [`ATTEMPT_TIMEOUT`]; an elapsed budget is
    /// classified as a transient [`ClientError::Timeout`]. Retry delays
    /// block the caller — operations are interactive and overlapping
    /// retries would amplify load on the external system.
    ///
    /// # Errors
    ///
    /// Non-transient errors are returned as-is from the failing attempt; a
    /// persistently transient failure is wrapped in
    /// [`ClientError::RetryExhausted`] after `max_attempts` attempts.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let outcome = match timeout(ATTEMPT_TIMEOUT, op()).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::timeout(operation, ATTEMPT_TIMEOUT.as_secs())),
            };

            match outcome {
                Ok(value) => {
                    self.observer.on_success(operation, attempt);
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    self.observer.on_attempt_failed(operation, attempt, &err);
                    let delay = self.policy.jittered_delay(attempt);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    self.observer.on_attempt_failed(operation, attempt, &err);
                    let wrapped = ClientError::retry_exhausted(attempt, err);
                    self.observer.on_exhausted(operation, attempt, &wrapped);
                    return Err(wrapped);
                }
                Err(err) => {
                    self.observer.on_attempt_failed(operation, attempt, &err);
                    return Err(err);
                }
            }
        }
    }
}
