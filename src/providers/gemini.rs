// Google Gemini generateContent adapter.
//
// API docs: https://ai.google.dev/api/generate-content

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::TextProvider;
use super::{check_status, decode_json, transport_error, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::ExtractError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn send(&self, prompt: &str, config: &ProviderConfig) -> Result<String, ExtractError> {
        let request = build_request(prompt, config);
        debug!(model = %config.model, prompt_chars = prompt.len(), "Sending Gemini request");

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, config.model
            ))
            .header("x-goog-api-key", &config.api_key)
            .timeout(config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        let response = check_status(self.kind(), response).await?;
        let body: GenerateResponse = decode_json(self.kind(), response).await?;
        completion_text(body)
    }
}

fn build_request<'a>(prompt: &'a str, config: &ProviderConfig) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        },
    }
}

fn completion_text(response: GenerateResponse) -> Result<String, ExtractError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(ExtractError::MalformedResponse(format!(
            "Gemini returned no completion ({reason})"
        )));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ExtractError::MalformedResponse(
            "Gemini returned an empty completion".into(),
        ));
    }
    Ok(text)
}

// --- Gemini request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_payload_uses_camel_case() {
        let config = ProviderConfig::new(ProviderKind::Gemini, "key");
        let value = serde_json::to_value(build_request("hi", &config)).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
        assert!(value["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn joins_candidate_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[1"},{"text":"]"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(completion_text(body).unwrap(), "[1]");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        match completion_text(body) {
            Err(ExtractError::MalformedResponse(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
