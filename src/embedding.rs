//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API, one text per request.
//!
//! Also provides the vector utilities used by the vector store:
//! - [`cosine_similarity`]: compute similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! Only rate limiting (HTTP 429) is retried, up to `embedding.max_retries`
//! attempts in total, sleeping `retry_backoff_ms × 2^attempt` between them.
//! Any other failure is returned immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::openai::{OpenAiClient, OpenAiError};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a single piece of text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Uploads still succeed, they
/// just index zero chunks.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API (`POST /embeddings`).
pub struct OpenAIProvider {
    client: OpenAiClient,
    model: String,
    max_attempts: u32,
    backoff: Duration,
}

impl OpenAIProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let client = OpenAiClient::new(
            &config.openai,
            Duration::from_secs(config.embedding.timeout_secs),
        )?;
        Ok(Self {
            client,
            model: config.embedding.model.clone(),
            max_attempts: config.embedding.max_retries.max(1),
            backoff: Duration::from_millis(config.embedding.retry_backoff_ms),
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            bail!("Refusing to embed empty text");
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        for attempt in 0..self.max_attempts {
            match self.client.post_json("embeddings", &body).await {
                Ok(json) => return parse_embedding_response(json),
                Err(OpenAiError::RateLimited(msg)) => {
                    if attempt + 1 == self.max_attempts {
                        break;
                    }
                    let delay = retry_delay(self.backoff, attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "OpenAI rate limit exceeded, retrying: {}",
                        msg
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        bail!(
            "Failed to generate embedding after {} attempts (rate limited)",
            self.max_attempts
        )
    }
}

/// `base × 2^attempt`, saturating instead of overflowing.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

fn parse_embedding_response(json: serde_json::Value) -> Result<Vec<f32>> {
    let response: EmbeddingResponse = serde_json::from_value(json)
        .map_err(|e| OpenAiError::InvalidResponse(e.to_string()))?;
    match response.data.into_iter().next() {
        Some(item) if !item.embedding.is_empty() => Ok(item.embedding),
        _ => Err(OpenAiError::InvalidResponse("empty embedding data".to_string()).into()),
    }
}

/// Create the [`EmbeddingProvider`] selected by `embedding.provider`.
pub fn create_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
