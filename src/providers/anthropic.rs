// Anthropic Messages API adapter.
//
// API docs: https://docs.anthropic.com/en/api/messages
// Overload errors come back as HTTP 529, which classify_status treats as
// transient along with the rest of the 5xx range.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::TextProvider;
use super::{check_status, decode_json, transport_error, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::ExtractError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl TextProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn send(&self, prompt: &str, config: &ProviderConfig) -> Result<String, ExtractError> {
        let request = build_request(prompt, config);
        debug!(model = %config.model, prompt_chars = prompt.len(), "Sending Anthropic request");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        let response = check_status(self.kind(), response).await?;
        let body: MessagesResponse = decode_json(self.kind(), response).await?;
        completion_text(body)
    }
}

fn build_request<'a>(prompt: &'a str, config: &'a ProviderConfig) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
    }
}

/// Join all text blocks; other block types (tool use, thinking) are ignored.
fn completion_text(response: MessagesResponse) -> Result<String, ExtractError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(ExtractError::MalformedResponse(
            "Anthropic returned no text content".into(),
        ));
    }
    Ok(text)
}

// --- Anthropic request/response types ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
