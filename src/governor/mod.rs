// Rate/retry governor: throttling and retries around a provider adapter.
//
// A GovernedProvider owns its adapter, its config and its own token bucket.
// Nothing here is process-global: two GovernedProviders for the same API
// have independent buckets, which keeps tests isolated.

pub mod rate_limiter;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ExtractError;
use crate::providers::traits::TextProvider;
use crate::providers::ProviderKind;

use self::rate_limiter::RateLimiter;
use self::retry::{with_retry, Attempted, RetryPolicy};

/// Per-call controls supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub cancel: CancellationToken,
    /// Overall deadline for throttling, retries and the request itself.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A provider adapter wrapped with its own rate limiter and retry policy.
pub struct GovernedProvider {
    provider: Arc<dyn TextProvider>,
    config: Arc<ProviderConfig>,
    limiter: RateLimiter,
    policy: RetryPolicy,
}

impl GovernedProvider {
    pub fn new(provider: Arc<dyn TextProvider>, config: ProviderConfig) -> Self {
        let limiter = RateLimiter::per_minute(config.requests_per_minute);
        let policy = RetryPolicy::from_config(&config);
        Self {
            provider,
            config: Arc::new(config),
            limiter,
            policy,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Send `prompt` through the limiter and retry policy.
    ///
    /// Returns the raw completion and how many network attempts it took.
    /// A passed deadline yields `DeadlineExceeded`; dropping the inner
    /// future releases the in-flight request.
    pub async fn call(
        &self,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<Attempted<String>, ExtractError> {
        let run = with_retry(&self.limiter, &self.policy, &options.cancel, || {
            self.provider.send(prompt, &self.config)
        });

        let result = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .unwrap_or(Err(ExtractError::DeadlineExceeded(limit))),
            None => run.await,
        };

        if let Ok(attempted) = &result {
            debug!(
                provider = %self.kind(),
                attempts = attempted.attempts,
                response_chars = attempted.value.len(),
                "Provider call succeeded"
            );
        }
        result
    }
}
