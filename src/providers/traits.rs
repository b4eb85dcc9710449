// Text provider trait: the swap-ready abstraction.
//
// Every adapter makes exactly one outbound request per `send` call. Retries
// and throttling live in the governor, not here.

use async_trait::async_trait;

use super::ProviderKind;
use crate::config::ProviderConfig;
use crate::error::ExtractError;

/// A text-generation endpoint: one prompt in, one completion out.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send `prompt` and return the raw completion text.
    ///
    /// Errors are already classified: `Auth`, `Transient`, `QuotaExceeded`,
    /// `Rejected`, or `MalformedResponse` when the envelope is unreadable.
    async fn send(&self, prompt: &str, config: &ProviderConfig) -> Result<String, ExtractError>;
}
