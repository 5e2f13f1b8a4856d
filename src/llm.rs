//! Chat completion providers.
//!
//! The [`ChatProvider`] trait is the single seam between bizdesk and the
//! language model. FAQ generation, business data extraction and RAG answers
//! all go through [`ChatProvider::complete`]. Completions are attempted
//! once; callers decide how to degrade on failure.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::openai::{OpenAiClient, OpenAiError};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    /// Ask the model for a single JSON object.
    pub json_response: bool,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run one completion and return the assistant message text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Used when `llm.provider = "disabled"`.
pub struct DisabledChatProvider;

#[async_trait]
impl ChatProvider for DisabledChatProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        bail!("Chat provider is disabled")
    }
}

/// `POST {api_base}/chat/completions`.
pub struct OpenAIChatProvider {
    client: OpenAiClient,
    model: String,
}

impl OpenAIChatProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.llm.timeout_secs);
        let client = OpenAiClient::new(&config.openai, timeout)?;
        Ok(Self {
            client,
            model: config.llm.model.clone(),
        })
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if request.json_response {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        body
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAIChatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = self.request_body(request);
        let json = self.client.post_json("chat/completions", &body).await?;
        Ok(parse_completion(json)?)
    }
}

fn parse_completion(json: serde_json::Value) -> Result<String, OpenAiError> {
    let response: CompletionResponse =
        serde_json::from_value(json).map_err(|e| OpenAiError::InvalidResponse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            OpenAiError::InvalidResponse("completion has no message content".to_string())
        })
}

/// Create the [`ChatProvider`] selected by `llm.provider`.
pub fn create_chat_provider(config: &Config) -> Result<Arc<dyn ChatProvider>> {
    match config.llm.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChatProvider)),
        "openai" => Ok(Arc::new(OpenAIChatProvider::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
