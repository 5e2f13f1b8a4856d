//! CLI command implementations for `bizdesk ingest`, `ask` and `show`.
//!
//! Each command builds its own [`AppContext`] from the loaded config and
//! prints human-readable output to stdout.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::app::AppContext;
use crate::business;
use crate::config::Config;
use crate::extract::{allowed_file, stored_filename};
use crate::ingest;
use crate::models::Business;
use crate::rag;
use crate::vector_store;

/// Run the upload pipeline on a file from disk.
pub async fn run_ingest(config: &Config, path: &Path, business_name: &str) -> Result<()> {
    let raw_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if !allowed_file(&raw_name, &config.upload.allowed_extensions) {
        bail!(
            "File type not allowed: {} (allowed: {})",
            raw_name,
            config.upload.allowed_extensions.join(", ")
        );
    }

    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() > config.upload.max_bytes {
        bail!(
            "File is too large: {} bytes (limit {})",
            bytes.len(),
            config.upload.max_bytes
        );
    }

    let filename = stored_filename(&raw_name);
    let ctx = AppContext::new(config.clone()).await?;
    let result = ingest::ingest_document(&ctx, business_name, &filename, bytes).await;
    ctx.close().await;
    let outcome = result?;

    println!("Ingested '{}' for {}", filename, outcome.business_name);
    println!("  business id: {}", outcome.business_id);
    println!(
        "  chunks:      {} ({} indexed)",
        outcome.chunks_total, outcome.chunks_indexed
    );
    println!("  faqs:        {}", outcome.faq_count);
    println!("  products:    {}", outcome.product_count);
    println!("ok");

    Ok(())
}

/// Answer a question for a stored business.
pub async fn run_ask(config: &Config, business_id: &str, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("Please enter a message.");
    }

    let ctx = AppContext::new(config.clone()).await?;
    let business = require_business(&ctx, business_id).await?;

    let chunks = vector_store::retrieve(
        &ctx.vectors,
        ctx.embedder.as_ref(),
        &business.id,
        question,
        config.retrieval.top_k,
    )
    .await;
    let answer = rag::generate_response(
        ctx.chat.as_ref(),
        &config.llm,
        &business.name,
        question,
        &chunks,
        &business.faqs(),
        &business.products(),
    )
    .await;
    ctx.close().await;

    println!("{}", answer);
    Ok(())
}

/// Print a stored business with its FAQs, products and info.
pub async fn run_show(config: &Config, business_id: &str) -> Result<()> {
    let ctx = AppContext::new(config.clone()).await?;
    let business = require_business(&ctx, business_id).await?;
    let vectors = ctx.vectors.count_for_business(&business.id).await?;
    ctx.close().await;

    println!("--- Business ---");
    println!("id:       {}", business.id);
    println!("name:     {}", business.name);
    println!(
        "file:     {}",
        business.original_filename.as_deref().unwrap_or("(unknown)")
    );
    println!("vectors:  {}", vectors);
    println!();

    let faqs = business.faqs();
    println!("--- FAQs ({}) ---", faqs.len());
    for faq in &faqs {
        println!(
            "Q: {}",
            faq.get("question").and_then(|v| v.as_str()).unwrap_or("")
        );
        println!(
            "A: {}",
            faq.get("answer").and_then(|v| v.as_str()).unwrap_or("")
        );
        println!();
    }

    let products = business.products();
    println!("--- Products ({}) ---", products.len());
    for product in &products {
        println!("{}", product);
    }
    println!();

    println!("--- Business Info ---");
    println!("{}", serde_json::to_string_pretty(&business.business_info())?);

    Ok(())
}

async fn require_business(ctx: &AppContext, business_id: &str) -> Result<Business> {
    match business::get_business(&ctx.pool, business_id).await? {
        Some(b) => Ok(b),
        None => {
            ctx.close().await;
            bail!("Business not found: {}", business_id)
        }
    }
}
