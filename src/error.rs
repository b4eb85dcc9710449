// Error taxonomy for the extraction pipeline.
//
// Library code returns these typed errors so callers can react per kind
// (switch providers on quota, re-authenticate on auth, give up on malformed
// output). The binary wraps them in anyhow like everything else.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between a content record and a topic list.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The content record can't be turned into a prompt.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Credentials were rejected. Fatal for that provider instance.
    #[error("{provider} rejected credentials: {message}")]
    Auth { provider: String, message: String },

    /// Timeout, 5xx, or plain rate limiting. The only retryable kind.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Account quota or billing limit reached. Callers may switch providers.
    #[error("{provider} quota exceeded: {message}")]
    QuotaExceeded { provider: String, message: String },

    /// Provider reply could not be turned into topics.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request was refused for a reason retrying won't fix (e.g. HTTP 400).
    #[error("{provider} rejected request (HTTP {status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    /// The caller cancelled the call.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller-supplied deadline passed before the call finished.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// No adapter is registered under this name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ExtractError {
    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Transient(_))
    }
}

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prompt,
    Provider,
    Parse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prompt => "prompt",
            Stage::Provider => "provider",
            Stage::Parse => "parse",
        };
        f.write_str(name)
    }
}

/// An [`ExtractError`] tagged with the stage it came from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: ExtractError,
}

impl StageError {
    pub fn new(stage: Stage, error: ExtractError) -> Self {
        Self { stage, error }
    }
}
