//! Upload pipeline.
//!
//! Runs the full document flow inline: extraction → business record →
//! chunking → embedding and vector storage → FAQ generation → product and
//! business info extraction → record update. Embedding and model failures
//! only reduce what gets stored. If a step after the business record was
//! created fails, the record and any vector entries written for it are
//! removed before the error is returned as [`IngestError::RolledBack`].

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::app::AppContext;
use crate::business::{self, AiDataUpdate};
use crate::chunk::TextSplitter;
use crate::extract;
use crate::insights;
use crate::vector_store;

/// Summary of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub business_id: String,
    pub business_name: String,
    pub chunks_total: usize,
    pub chunks_indexed: usize,
    pub faq_count: usize,
    pub product_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Failed before any business record was written.
    #[error(transparent)]
    Rejected(anyhow::Error),
    /// Failed after the record was created; it has been removed again.
    #[error(transparent)]
    RolledBack(anyhow::Error),
}

impl IngestError {
    /// Whether a business record existed at the time of the failure.
    pub fn record_created(&self) -> bool {
        matches!(self, IngestError::RolledBack(_))
    }
}

/// Process one uploaded document for a new business.
///
/// `filename` must already be sanitized; its extension selects the extractor.
pub async fn ingest_document(
    ctx: &AppContext,
    business_name: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<IngestOutcome, IngestError> {
    let business_name = business_name.trim();
    if business_name.is_empty() {
        return Err(IngestError::Rejected(anyhow!("Business name is required")));
    }

    let text = extract_text_blocking(filename, bytes)
        .await
        .map_err(IngestError::Rejected)?;
    if text.trim().is_empty() {
        return Err(IngestError::Rejected(anyhow!(
            "Could not extract valid text from {}",
            filename
        )));
    }
    tracing::info!(filename, chars = text.chars().count(), "extracted text");

    let business_id = business::generate_business_id(business_name, Utc::now());
    business::add_business(&ctx.pool, &business_id, business_name, filename)
        .await
        .map_err(IngestError::Rejected)?;

    match process(ctx, &business_id, business_name, filename, &text).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            rollback(ctx, &business_id).await;
            Err(IngestError::RolledBack(e))
        }
    }
}

async fn extract_text_blocking(filename: &str, bytes: Vec<u8>) -> Result<String> {
    let name = filename.to_string();
    let text = tokio::task::spawn_blocking(move || extract::extract_text(&bytes, &name))
        .await
        .context("text extraction task failed")?
        .with_context(|| format!("Could not extract valid text from {}", filename))?;
    Ok(text)
}

async fn process(
    ctx: &AppContext,
    business_id: &str,
    business_name: &str,
    filename: &str,
    text: &str,
) -> Result<IngestOutcome> {
    tracing::info!(business_id, "processing upload");

    let chunks = TextSplitter::from_config(&ctx.config.chunking).split_text(text);
    if chunks.is_empty() {
        tracing::warn!(business_id, filename, "no text chunks generated");
    }

    let chunks_indexed = match vector_store::index_document(
        &ctx.vectors,
        ctx.embedder.as_ref(),
        business_id,
        filename,
        &chunks,
    )
    .await
    {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(business_id, "failed adding chunks to vector store: {:#}", e);
            0
        }
    };

    let faqs = insights::generate_faqs(ctx.chat.as_ref(), &ctx.config.llm, text).await;
    let extracted = insights::extract_business_data(ctx.chat.as_ref(), &ctx.config.llm, text).await;

    business::update_ai_data(
        &ctx.pool,
        business_id,
        &AiDataUpdate {
            faqs: Some(&faqs),
            products: Some(&extracted.products),
            business_info: Some(&extracted.business_info),
        },
    )
    .await
    .context("Failed to store generated business data")?;

    tracing::info!(business_id, chunks_indexed, faqs = faqs.len(), "upload processed");

    Ok(IngestOutcome {
        business_id: business_id.to_string(),
        business_name: business_name.to_string(),
        chunks_total: chunks.len(),
        chunks_indexed,
        faq_count: faqs.len(),
        product_count: extracted.products.len(),
    })
}

async fn rollback(ctx: &AppContext, business_id: &str) {
    tracing::warn!(business_id, "rolling back failed upload");
    if let Err(e) = ctx.vectors.delete_business(business_id).await {
        tracing::error!(business_id, "failed to remove vector entries: {:#}", e);
    }
    if let Err(e) = business::delete_business(&ctx.pool, business_id).await {
        tracing::error!(business_id, "failed to remove business record: {:#}", e);
    }
}
