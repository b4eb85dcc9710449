// Extractor facade: the single entry point application code calls.
//
// Composes prompt building, the governed provider call and response
// parsing, then attaches latency and a cost estimate. Every failure is
// tagged with the stage that produced it and handed back to the caller;
// nothing is replaced with a default topic list.

pub mod cost;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ExtractError, Stage, StageError};
use crate::governor::{CallOptions, GovernedProvider};
use crate::models::{ContentRecord, ExtractionResult, Topic};
use crate::parser::parse_topics;
use crate::prompt::build_prompt;
use crate::providers::{create_provider, ProviderKind};

/// Runs topic extractions against a fixed set of providers.
#[derive(Default)]
pub struct Extractor {
    providers: BTreeMap<ProviderKind, GovernedProvider>,
}

struct PipelineOutcome {
    provider_name: String,
    cost_estimate: f64,
    topics: Result<Vec<Topic>, StageError>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every provider that has an API key configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut extractor = Self::new();
        for kind in config.configured_providers() {
            if let Some(provider_config) = config.provider(kind) {
                let adapter = create_provider(kind, provider_config)?;
                extractor.register(GovernedProvider::new(adapter, provider_config.clone()));
            }
        }
        Ok(extractor)
    }

    /// Add or replace the provider for its kind.
    pub fn register(&mut self, provider: GovernedProvider) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with_provider(mut self, provider: GovernedProvider) -> Self {
        self.register(provider);
        self
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&GovernedProvider> {
        self.providers.get(&kind)
    }

    /// Extract topics with default call options (no deadline, never cancelled).
    pub async fn extract_topics(
        &self,
        content: &ContentRecord,
        provider_name: &str,
    ) -> ExtractionResult {
        self.extract_topics_with(content, provider_name, &CallOptions::default())
            .await
    }

    /// Extract topics. Failures are reported in `ExtractionResult::error`.
    pub async fn extract_topics_with(
        &self,
        content: &ContentRecord,
        provider_name: &str,
        options: &CallOptions,
    ) -> ExtractionResult {
        let started = Instant::now();
        let outcome = self.run_pipeline(content, provider_name, options).await;
        let latency = started.elapsed();

        let (topics, error) = match outcome.topics {
            Ok(topics) => {
                info!(
                    provider = %outcome.provider_name,
                    topics = topics.len(),
                    latency_ms = latency.as_millis() as u64,
                    cost_usd = outcome.cost_estimate,
                    "Extraction complete"
                );
                (topics, None)
            }
            Err(err) => {
                warn!(
                    provider = %outcome.provider_name,
                    stage = %err.stage,
                    error = %err.error,
                    "Extraction failed"
                );
                (Vec::new(), Some(err))
            }
        };

        ExtractionResult {
            provider_name: outcome.provider_name,
            topics,
            latency,
            cost_estimate: outcome.cost_estimate,
            error,
            extracted_at: Utc::now(),
        }
    }

    /// Like `extract_topics_with`, but a failure comes back as `Err`.
    pub async fn try_extract(
        &self,
        content: &ContentRecord,
        provider_name: &str,
        options: &CallOptions,
    ) -> Result<ExtractionResult, StageError> {
        self.extract_topics_with(content, provider_name, options)
            .await
            .into_result()
    }

    /// Run the same content through several providers concurrently.
    ///
    /// Results come back in the order requested. Failures are reported per
    /// provider; choosing a fallback is up to the caller.
    pub async fn compare(
        &self,
        content: &ContentRecord,
        provider_names: &[&str],
        options: &CallOptions,
    ) -> Vec<ExtractionResult> {
        join_all(
            provider_names
                .iter()
                .map(|name| self.extract_topics_with(content, name, options)),
        )
        .await
    }

    async fn run_pipeline(
        &self,
        content: &ContentRecord,
        provider_name: &str,
        options: &CallOptions,
    ) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            provider_name: provider_name.to_string(),
            cost_estimate: 0.0,
            topics: Ok(Vec::new()),
        };

        let provider = match provider_name
            .parse::<ProviderKind>()
            .and_then(|kind| {
                self.providers
                    .get(&kind)
                    .ok_or_else(|| ExtractError::UnknownProvider(provider_name.to_string()))
            }) {
            Ok(provider) => provider,
            Err(err) => {
                outcome.topics = Err(StageError::new(Stage::Provider, err));
                return outcome;
            }
        };
        let kind = provider.kind();
        outcome.provider_name = kind.to_string();
        let config = provider.config();

        let prompt = match build_prompt(content, &config.prompt_rules()) {
            Ok(prompt) => prompt,
            Err(err) => {
                outcome.topics = Err(StageError::new(Stage::Prompt, err));
                return outcome;
            }
        };

        let raw = match provider.call(&prompt, options).await {
            Ok(attempted) => attempted.value,
            Err(err) => {
                outcome.topics = Err(StageError::new(Stage::Provider, err));
                return outcome;
            }
        };
        outcome.cost_estimate = cost::estimate_cost(kind, &prompt, &raw);

        outcome.topics = parse_topics(&raw, &config.filter_rules())
            .map_err(|err| StageError::new(Stage::Parse, err));
        outcome
    }
}
