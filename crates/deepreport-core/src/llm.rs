//! Model-invocation collaborator boundary.
//!
//! Requests and responses cross this seam as typed structs, never as loose
//! JSON maps. An empty completion signals "no content" and is not an error;
//! transient connectivity failures are the only retryable class.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{LlmConfig, SecretValue};
use crate::error::DeepReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Blocking request-response seam to the language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the trimmed completion text, or an empty string when the model
    /// produced no content.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, DeepReportError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretValue,
    max_retries: usize,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig, api_key: SecretValue) -> Result<Self, DeepReportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DeepReportError::Llm)?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        })
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<String, DeepReportError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(DeepReportError::Llm)?
            .error_for_status()
            .map_err(DeepReportError::Llm)?
            .json::<ChatResponse>()
            .await
            .map_err(DeepReportError::Llm)?;

        Ok(extract_content(response))
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, DeepReportError> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ];

        let mut attempt = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            debug!(endpoint = %self.endpoint, model = %self.model, attempt, "invoking model");

            match self.send(&messages).await {
                Ok(content) => return Ok(content),
                Err(err) if attempt < self.max_retries && err.is_transient() => {
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        backoff_ms,
                        "model invocation failed transiently, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.max_backoff_ms);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn extract_content(response: ChatResponse) -> String {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        warn!("model response contained no content");
    }
    content
}
