// Retry state machine with exponential backoff for transient failures.
//
// Each call walks Pending -> Throttled -> InFlight and ends in Succeeded or
// FailedPermanently, possibly passing through RetryScheduled on the way.
// Only ExtractError::Transient schedules a retry. Cancellation is checked
// in every state that waits and always wins over a pending retry.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::rate_limiter::RateLimiter;
use crate::config::ProviderConfig;
use crate::error::ExtractError;

/// Maximum backoff delay to cap exponential growth.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            base_backoff: config.retry_backoff,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Where a governed call currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum CallState<T> {
    Pending,
    /// Waiting for a rate-limit token.
    Throttled,
    /// Request `attempt` (1-based) is on the wire.
    InFlight { attempt: u32 },
    /// Attempt `attempt` failed transiently; sleeping `backoff` before the next.
    RetryScheduled { attempt: u32, backoff: Duration },
    Succeeded(T),
    FailedPermanently(ExtractError),
}

impl<T> CallState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Succeeded(_) | CallState::FailedPermanently(_))
    }

    fn label(&self) -> &'static str {
        match self {
            CallState::Pending => "pending",
            CallState::Throttled => "throttled",
            CallState::InFlight { .. } => "in_flight",
            CallState::RetryScheduled { .. } => "retry_scheduled",
            CallState::Succeeded(_) => "succeeded",
            CallState::FailedPermanently(_) => "failed_permanently",
        }
    }
}

/// A successful governed call.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    /// Network attempts made, including the successful one.
    pub attempts: u32,
}

/// Run `operation` under the limiter with retries for transient errors.
///
/// The limiter's `acquire()` is called before each attempt, so retries
/// also respect the bucket. At most `policy.max_retries + 1` attempts are
/// made. Cancellation aborts any wait or in-flight attempt and yields
/// `Cancelled`; the in-flight future is dropped.
pub async fn with_retry<F, Fut, T>(
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<Attempted<T>, ExtractError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let mut state = CallState::Pending;
    let mut attempts = 0u32;

    loop {
        debug!(state = state.label(), attempts, "Governor state");

        state = match state {
            CallState::Pending => {
                if cancel.is_cancelled() {
                    return Err(ExtractError::Cancelled);
                }
                CallState::Throttled
            }

            CallState::Throttled => {
                limiter.acquire(cancel).await?;
                attempts += 1;
                CallState::InFlight { attempt: attempts }
            }

            CallState::InFlight { attempt } => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ExtractError::Cancelled),
                    result = operation() => result,
                };

                match result {
                    Ok(value) => CallState::Succeeded(value),
                    Err(ExtractError::Cancelled) => return Err(ExtractError::Cancelled),
                    Err(err) if err.is_retryable() && attempt <= policy.max_retries => {
                        let backoff = policy.backoff_for(attempt);
                        warn!(
                            attempt,
                            max_retries = policy.max_retries,
                            backoff_secs = backoff.as_secs_f64(),
                            error = %err,
                            "Transient failure, retrying in {:.1}s (retry {}/{})",
                            backoff.as_secs_f64(),
                            attempt,
                            policy.max_retries,
                        );
                        CallState::RetryScheduled { attempt, backoff }
                    }
                    Err(err) => CallState::FailedPermanently(err),
                }
            }

            CallState::RetryScheduled { backoff, .. } => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                CallState::Throttled
            }

            CallState::Succeeded(value) => {
                return Ok(Attempted { value, attempts });
            }

            CallState::FailedPermanently(err) => {
                warn!(attempts, error = %err, "Provider call failed permanently");
                return Err(err);
            }
        };
    }
}
