use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::parser::FilterRules;
use crate::prompt::{PromptRules, DEFAULT_MAX_BODY_CHARS};
use crate::providers::ProviderKind;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_MAX_TOPICS: usize = 5;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1000);
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one provider adapter.
///
/// Built once at startup and shared read-only by every call to that
/// provider. Nothing here is reloaded at runtime.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    /// Endpoint override (proxies, gateways, local stubs). None = provider default.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub min_confidence: f64,
    pub max_topics: usize,
    /// Retries after the first attempt, for transient failures only.
    pub retry_attempts: u32,
    /// Base delay; doubles with each retry.
    pub retry_backoff: Duration,
    /// Token bucket capacity, refilled over a minute. 0 disables throttling.
    pub requests_per_minute: u32,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Treat "no topics survived filtering" as a malformed response.
    pub require_topics: bool,
}

impl ProviderConfig {
    /// Defaults for `kind` with the given key.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: kind.default_model().to_string(),
            base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_topics: DEFAULT_MAX_TOPICS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            require_topics: false,
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn prompt_rules(&self) -> PromptRules {
        PromptRules {
            max_topics: self.max_topics,
            min_confidence: self.min_confidence,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn filter_rules(&self) -> FilterRules {
        FilterRules {
            min_confidence: self.min_confidence,
            max_topics: self.max_topics,
            require_topics: self.require_topics,
        }
    }
}

// Hand-written so API keys never end up in logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &if self.has_api_key() { "<redacted>" } else { "<unset>" })
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("min_confidence", &self.min_confidence)
            .field("max_topics", &self.max_topics)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("request_timeout", &self.request_timeout)
            .field("require_topics", &self.require_topics)
            .finish()
    }
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded at startup via dotenvy. Every provider gets an entry even
/// without a key, so `providers` can report what's missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub providers: BTreeMap<ProviderKind, ProviderConfig>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (a HashMap in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let temperature: f32 = parse_var(&lookup, "TOPICAL_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&temperature) {
            bail!("TOPICAL_TEMPERATURE must be between 0.0 and 2.0, got {temperature}");
        }

        let min_confidence: f64 =
            parse_var(&lookup, "TOPICAL_MIN_CONFIDENCE", DEFAULT_MIN_CONFIDENCE)?;
        if !(0.0..=1.0).contains(&min_confidence) {
            bail!("TOPICAL_MIN_CONFIDENCE must be between 0.0 and 1.0, got {min_confidence}");
        }

        let max_topics: usize = parse_var(&lookup, "TOPICAL_MAX_TOPICS", DEFAULT_MAX_TOPICS)?;
        if max_topics == 0 {
            bail!("TOPICAL_MAX_TOPICS must be at least 1");
        }

        let max_tokens: u32 = parse_var(&lookup, "TOPICAL_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let retry_attempts: u32 =
            parse_var(&lookup, "TOPICAL_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)?;
        let retry_backoff_ms: u64 = parse_var(
            &lookup,
            "TOPICAL_RETRY_BACKOFF_MS",
            DEFAULT_RETRY_BACKOFF.as_millis() as u64,
        )?;
        let requests_per_minute: u32 = parse_var(
            &lookup,
            "TOPICAL_REQUESTS_PER_MINUTE",
            DEFAULT_REQUESTS_PER_MINUTE,
        )?;
        let request_timeout_secs: u64 = parse_var(
            &lookup,
            "TOPICAL_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        if request_timeout_secs == 0 {
            bail!("TOPICAL_REQUEST_TIMEOUT_SECS must be at least 1");
        }
        let require_topics = match lookup("TOPICAL_REQUIRE_TOPICS") {
            Some(raw) => parse_bool("TOPICAL_REQUIRE_TOPICS", &raw)?,
            None => false,
        };

        let mut providers = BTreeMap::new();
        for kind in ProviderKind::ALL {
            let prefix = format!("TOPICAL_{}", kind.as_str().to_ascii_uppercase());
            let mut config = ProviderConfig::new(kind, lookup(kind.api_key_var()).unwrap_or_default());
            if let Some(model) = non_empty(lookup(&format!("{prefix}_MODEL"))) {
                config.model = model;
            }
            config.base_url = non_empty(lookup(&format!("{prefix}_BASE_URL")));
            config.temperature = temperature;
            config.max_tokens = max_tokens;
            config.min_confidence = min_confidence;
            config.max_topics = max_topics;
            config.retry_attempts = retry_attempts;
            config.retry_backoff = Duration::from_millis(retry_backoff_ms);
            config.requests_per_minute = requests_per_minute;
            config.request_timeout = Duration::from_secs(request_timeout_secs);
            config.require_topics = require_topics;
            providers.insert(kind, config);
        }

        Ok(Self { providers })
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(&kind)
    }

    /// Providers with an API key set.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|(_, config)| config.has_api_key())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Check that a provider's API key is configured.
    /// Call this before any operation that talks to that provider.
    pub fn require_provider(&self, kind: ProviderKind) -> Result<()> {
        let configured = self.provider(kind).is_some_and(ProviderConfig::has_api_key);
        if !configured {
            bail!(
                "{} not set. Add it to your .env file.\n\
                 See .env.example for the required variables.",
                kind.api_key_var()
            );
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is not valid: {e}")),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key}={other:?} is not a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("K", "Yes").unwrap());
        assert!(!parse_bool("K", "off").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }
}
