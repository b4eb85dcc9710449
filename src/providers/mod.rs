// Provider adapters: trait-based abstraction over text-generation APIs.
//
// The TextProvider trait defines the contract: one prompt in, one string out.
// Each adapter only differs in endpoint, auth header and payload shape.
// Providers are a closed set (ProviderKind) and are built through
// create_provider, never picked by inspecting types at runtime.

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ProviderConfig;
use crate::error::ExtractError;
use crate::output::truncate_chars;

use self::traits::TextProvider;

const USER_AGENT: &str = concat!("topical/", env!("CARGO_PKG_VERSION"));

/// The supported text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => openai::DEFAULT_BASE_URL,
            ProviderKind::Anthropic => anthropic::DEFAULT_BASE_URL,
            ProviderKind::Gemini => gemini::DEFAULT_BASE_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            _ => Err(ExtractError::UnknownProvider(s.to_string())),
        }
    }
}

/// Build the adapter for `kind`, pointed at the configured base URL.
pub fn create_provider(kind: ProviderKind, config: &ProviderConfig) -> Result<Arc<dyn TextProvider>> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;
    let base_url = config
        .base_url
        .as_deref()
        .unwrap_or(kind.default_base_url())
        .trim_end_matches('/')
        .to_string();

    let provider: Arc<dyn TextProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(openai::OpenAiProvider::new(client, base_url)),
        ProviderKind::Anthropic => Arc::new(anthropic::AnthropicProvider::new(client, base_url)),
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new(client, base_url)),
    };
    Ok(provider)
}

/// Map a non-success HTTP status to the error taxonomy.
pub fn classify_status(kind: ProviderKind, status: u16, body: &str) -> ExtractError {
    let provider = kind.to_string();
    let message = truncate_chars(body.trim(), 200);

    match status {
        401 | 403 => ExtractError::Auth { provider, message },
        402 => ExtractError::QuotaExceeded { provider, message },
        400 | 429 if mentions_quota(body) => ExtractError::QuotaExceeded { provider, message },
        408 | 429 | 500..=599 => {
            ExtractError::Transient(format!("{provider} returned HTTP {status}: {message}"))
        }
        _ => ExtractError::Rejected {
            provider,
            status,
            message,
        },
    }
}

fn mentions_quota(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    ["quota", "billing", "credit balance", "insufficient_credits"]
        .iter()
        .any(|marker| body.contains(marker))
}

/// Map a reqwest transport failure to the error taxonomy.
pub(crate) fn transport_error(kind: ProviderKind, err: reqwest::Error) -> ExtractError {
    if err.is_builder() {
        return ExtractError::InvalidInput(format!("could not build {kind} request: {err}"));
    }
    if err.is_timeout() {
        return ExtractError::Transient(format!("{kind} request timed out"));
    }
    ExtractError::Transient(format!("{kind} request failed: {err}"))
}

/// Pass successful responses through, classify everything else.
pub(crate) async fn check_status(
    kind: ProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, ExtractError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(kind, status.as_u16(), &body))
}

/// Read and decode a success envelope.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    kind: ProviderKind,
    response: reqwest::Response,
) -> Result<T, ExtractError> {
    let body = response.text().await.map_err(|e| transport_error(kind, e))?;
    serde_json::from_str(&body).map_err(|e| {
        ExtractError::MalformedResponse(format!("{kind} response envelope did not decode: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" claude ".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!(matches!(
            "mistral".parse::<ProviderKind>(),
            Err(ExtractError::UnknownProvider(_))
        ));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn classifies_auth() {
        assert!(matches!(
            classify_status(ProviderKind::OpenAi, 401, "invalid api key"),
            ExtractError::Auth { .. }
        ));
        assert!(matches!(
            classify_status(ProviderKind::Gemini, 403, "PERMISSION_DENIED"),
            ExtractError::Auth { .. }
        ));
    }

    #[test]
    fn classifies_quota_separately_from_rate_limit() {
        let quota = classify_status(
            ProviderKind::OpenAi,
            429,
            r#"{"error":{"code":"insufficient_quota"}}"#,
        );
        assert!(matches!(quota, ExtractError::QuotaExceeded { .. }));

        let rate = classify_status(ProviderKind::OpenAi, 429, "Rate limit reached for requests");
        assert!(rate.is_retryable());

        let billing = classify_status(
            ProviderKind::Anthropic,
            400,
            "Your credit balance is too low to access the Anthropic API",
        );
        assert!(matches!(billing, ExtractError::QuotaExceeded { .. }));
        assert!(matches!(
            classify_status(ProviderKind::Anthropic, 402, ""),
            ExtractError::QuotaExceeded { .. }
        ));
    }

    #[test]
    fn classifies_server_errors_as_transient() {
        for status in [408, 500, 502, 503, 529] {
            assert!(
                classify_status(ProviderKind::Anthropic, status, "overloaded").is_retryable(),
                "HTTP {status} should be retryable"
            );
        }
    }

    #[test]
    fn classifies_other_client_errors_as_rejected() {
        match classify_status(ProviderKind::OpenAi, 400, "unknown parameter") {
            ExtractError::Rejected { status, .. } => assert_eq!(status, 400),
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(matches!(
            classify_status(ProviderKind::OpenAi, 404, "model not found"),
            ExtractError::Rejected { .. }
        ));
    }
}
