//! Minimal client for the OpenAI-compatible REST API.
//!
//! Shared by the embedding and chat providers. Only transport and status
//! classification live here; retry policy belongs to the callers.

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::config::OpenAiConfig;

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("OpenAI rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("OpenAI API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("OpenAI request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid OpenAI response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST a JSON body to `{api_base}/{path}` and return the decoded JSON reply.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, OpenAiError> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body_text = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OpenAiError::RateLimited(body_text));
        }
        Err(OpenAiError::Status {
            status,
            body: body_text,
        })
    }
}
