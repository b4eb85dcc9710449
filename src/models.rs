// Data models: the types that flow in and out of the extraction pipeline.
//
// ContentRecord comes from an external content pipeline, ExtractionResult
// goes to an external storage layer. Neither is persisted here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::StageError;

/// A piece of content to extract topics from. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub body: String,
}

impl ContentRecord {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A validated topic label.
///
/// `name` is always a lowercase hyphenated slug and `confidence` is always
/// within [0.0, 1.0]; the parser drops anything that can't satisfy both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub display_name: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// The outcome of one `extract_topics` call.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub provider_name: String,
    /// Ordered by descending confidence, ties kept in reply order.
    pub topics: Vec<Topic>,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    /// Estimated cost in USD.
    pub cost_estimate: f64,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<StageError>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, surfacing the stage error if there is one.
    pub fn into_result(self) -> Result<Self, StageError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

fn serialize_millis<S: Serializer>(latency: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(latency.as_millis() as u64)
}

fn serialize_error<S: Serializer>(error: &Option<StageError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, Stage};

    #[test]
    fn content_record_deserializes_with_missing_fields() {
        let record: ContentRecord =
            serde_json::from_str(r#"{"title":"Intro to React Hooks","body":"..."}"#).unwrap();
        assert_eq!(record.title, "Intro to React Hooks");
        assert_eq!(record.url, "");
        assert!(record.description.is_none());
    }

    #[test]
    fn result_serializes_latency_and_error() {
        let result = ExtractionResult {
            provider_name: "openai".to_string(),
            topics: vec![],
            latency: Duration::from_millis(1250),
            cost_estimate: 0.0,
            error: Some(StageError::new(Stage::Provider, ExtractError::Cancelled)),
            extracted_at: Utc::now(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["latency_ms"], 1250);
        assert_eq!(json["error"], "provider stage failed: operation cancelled");
        assert!(!result.is_success());
        assert!(result.into_result().is_err());
    }
}
