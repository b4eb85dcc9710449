// OpenAI Chat Completions adapter.
//
// API docs: https://platform.openai.com/docs/api-reference/chat/create

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::TextProvider;
use super::{check_status, decode_json, transport_error, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::ExtractError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn send(&self, prompt: &str, config: &ProviderConfig) -> Result<String, ExtractError> {
        let request = build_request(prompt, config);
        debug!(model = %config.model, prompt_chars = prompt.len(), "Sending OpenAI request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&config.api_key)
            .timeout(config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        let response = check_status(self.kind(), response).await?;
        let body: ChatResponse = decode_json(self.kind(), response).await?;
        completion_text(body)
    }
}

fn build_request<'a>(prompt: &'a str, config: &'a ProviderConfig) -> ChatRequest<'a> {
    ChatRequest {
        model: &config.model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

fn completion_text(response: ChatResponse) -> Result<String, ExtractError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ExtractError::MalformedResponse("OpenAI returned no completion".into()))
}

// --- OpenAI request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_payload_shape() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-test");
        let value = serde_json::to_value(build_request("hello", &config)).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["max_tokens"], 1024);
        assert!(value.get("api_key").is_none());
    }

    #[test]
    fn reads_first_choice() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"[]"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(completion_text(body).unwrap(), "[]");
    }

    #[test]
    fn empty_choices_is_malformed() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            completion_text(body),
            Err(ExtractError::MalformedResponse(_))
        ));
    }

    #[test]
    fn null_content_is_malformed() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(completion_text(body).is_err());
    }
}
