//! Document-level insights produced by the language model at upload time.
//!
//! Both calls ask for a JSON object, read the expected keys and fall back to
//! empty values on any failure. An upload never fails because of them.

use serde_json::Value;

use crate::chunk::truncate_chars;
use crate::config::LlmConfig;
use crate::llm::{ChatMessage, ChatProvider, ChatRequest};
use crate::models::{empty_object, ExtractedBusinessData};

const FAQ_SYSTEM_PROMPT: &str = r#"You are an AI assistant that generates helpful frequently asked questions for a business from its own documents.

Read the document text and write 5 to 10 questions a customer is likely to ask, each with a concise answer taken only from the document. Do not invent facts that are not in the text.

Respond with a single JSON object of the form:
{"faqs": [{"question": "...", "answer": "..."}]}"#;

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an AI assistant extracting structured business data from a business document.

Identify the products or services the business offers and general facts about the business. Only use information present in the text; leave out anything that is not mentioned.

Respond with a single JSON object of the form:
{
  "products": [{"name": "...", "description": "...", "price": "..."}],
  "business_info": {"description": "...", "hours": "...", "location": "...", "contact": "...", "policies": "..."}
}"#;

/// Generate FAQ entries for a document. Empty text or any failure yields none.
pub async fn generate_faqs(chat: &dyn ChatProvider, config: &LlmConfig, text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    tracing::info!("generating FAQs");

    let request = document_request(FAQ_SYSTEM_PROMPT, text, config.document_char_limit);
    let faqs = match chat.complete(&request).await {
        Ok(content) => parse_faqs(&content),
        Err(e) => {
            tracing::error!("FAQ generation failed: {:#}", e);
            return Vec::new();
        }
    };

    tracing::info!(count = faqs.len(), "generated FAQs");
    faqs
}

/// Extract products and business info from a document.
pub async fn extract_business_data(
    chat: &dyn ChatProvider,
    config: &LlmConfig,
    text: &str,
) -> ExtractedBusinessData {
    if text.trim().is_empty() {
        return ExtractedBusinessData::default();
    }
    tracing::info!("extracting business data");

    let request = document_request(EXTRACTION_SYSTEM_PROMPT, text, config.document_char_limit);
    let data = match chat.complete(&request).await {
        Ok(content) => parse_business_data(&content),
        Err(e) => {
            tracing::error!("business data extraction failed: {:#}", e);
            return ExtractedBusinessData::default();
        }
    };

    tracing::info!(products = data.products.len(), "extracted business data");
    data
}

fn document_request(system_prompt: &str, text: &str, char_limit: usize) -> ChatRequest {
    let excerpt = truncate_chars(text, char_limit);
    ChatRequest {
        messages: vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(format!("Document Text:\n```\n{}\n```", excerpt)),
        ],
        temperature: None,
        json_response: true,
    }
}

fn parse_object(content: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::warn!("model returned JSON that is not an object");
            None
        }
        Err(e) => {
            tracing::warn!("model returned invalid JSON: {}", e);
            None
        }
    }
}

fn parse_faqs(content: &str) -> Vec<Value> {
    let Some(mut map) = parse_object(content) else {
        return Vec::new();
    };
    match map.remove("faqs") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn parse_business_data(content: &str) -> ExtractedBusinessData {
    let Some(mut map) = parse_object(content) else {
        return ExtractedBusinessData::default();
    };
    let products = match map.remove("products") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let business_info = match map.remove("business_info") {
        Some(info @ Value::Object(_)) => info,
        _ => empty_object(),
    };
    ExtractedBusinessData {
        products,
        business_info,
    }
}
