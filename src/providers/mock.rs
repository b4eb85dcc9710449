// Scripted provider: a TextProvider that replays canned replies.
//
// Used by tests and for offline runs. Replies are served in order; once
// only one is left it is repeated forever. Every call is counted and its
// prompt recorded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::traits::TextProvider;
use super::ProviderKind;
use crate::config::ProviderConfig;
use crate::error::ExtractError;

pub struct ScriptedProvider {
    kind: ProviderKind,
    replies: Mutex<VecDeque<Result<String, ExtractError>>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Serve `replies` in order, repeating the last one.
    pub fn new(kind: ProviderKind, replies: Vec<Result<String, ExtractError>>) -> Self {
        Self {
            kind,
            replies: Mutex::new(replies.into()),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Always answer with `reply`.
    pub fn always(kind: ProviderKind, reply: Result<String, ExtractError>) -> Self {
        Self::new(kind, vec![reply])
    }

    /// Wait this long (tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `send` calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<String, ExtractError> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_else(|| Err(exhausted()))
        } else {
            replies.front().cloned().unwrap_or_else(|| Err(exhausted()))
        }
    }
}

fn exhausted() -> ExtractError {
    ExtractError::MalformedResponse("scripted provider has no replies".into())
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, prompt: &str, _config: &ProviderConfig) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_in_order_then_repeats_last() {
        let provider = ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Err(ExtractError::Transient("503".into())), Ok("[]".into())],
        );
        let config = ProviderConfig::new(ProviderKind::OpenAi, "k");

        assert!(provider.send("a", &config).await.is_err());
        assert_eq!(provider.send("b", &config).await.unwrap(), "[]");
        assert_eq!(provider.send("c", &config).await.unwrap(), "[]");
        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_script_is_malformed() {
        let provider = ScriptedProvider::new(ProviderKind::Gemini, vec![]);
        let config = ProviderConfig::new(ProviderKind::Gemini, "k");
        assert!(matches!(
            provider.send("a", &config).await,
            Err(ExtractError::MalformedResponse(_))
        ));
    }
}
