//! Retrieval-augmented answers for the chat endpoint.

use serde_json::Value;

use crate::chunk::truncate_chars;
use crate::config::LlmConfig;
use crate::llm::{ChatMessage, ChatProvider, ChatRequest};

/// Returned to the user whenever the completion call fails.
pub const RAG_FAILURE_MESSAGE: &str =
    "I'm sorry, there was an issue generating a response right now.";

/// Assemble the context block placed in the system prompt.
///
/// FAQs are only included when retrieval found nothing; the product summary
/// is included whenever the business has products.
pub fn build_context(
    business_name: &str,
    chunks: &[String],
    faqs: &[Value],
    products: &[Value],
) -> String {
    let mut context = format!(
        "Retrieved context from business documents for {}:\n",
        business_name
    );

    if chunks.is_empty() {
        context.push_str("(No specific context found in documents for this query.)\n");
    } else {
        for (i, chunk) in chunks.iter().enumerate() {
            context.push_str(&format!("Chunk {}: {}\n---\n", i + 1, chunk));
        }
    }

    if chunks.is_empty() && !faqs.is_empty() {
        context.push_str("\nGeneral FAQs:\n");
        context.push_str(&pretty(faqs));
        context.push('\n');
    }
    if !products.is_empty() {
        context.push_str("\nProduct/Service List Summary:\n");
        context.push_str(&pretty(products));
        context.push('\n');
    }

    context
}

fn pretty(values: &[Value]) -> String {
    serde_json::to_string_pretty(values).unwrap_or_else(|_| "[]".to_string())
}

fn system_prompt(assistant_name: &str, business_name: &str, context: &str) -> String {
    format!(
        "You are {assistant}, an AI customer support agent for '{business}'. \
Answer customer questions politely and concisely using only the context below. \
If the context does not contain the answer, say that you don't have that information \
and suggest contacting {business} directly. Never make up prices, products or policies.

--- Context Start ---
{context}
--- Context End ---
",
        assistant = assistant_name,
        business = business_name,
        context = context,
    )
}

/// Answer `message` for a business. Never fails; see [`RAG_FAILURE_MESSAGE`].
pub async fn generate_response(
    chat: &dyn ChatProvider,
    config: &LlmConfig,
    business_name: &str,
    message: &str,
    chunks: &[String],
    faqs: &[Value],
    products: &[Value],
) -> String {
    let context = build_context(business_name, chunks, faqs, products);
    let context = truncate_chars(&context, config.context_char_limit);

    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(system_prompt(&config.assistant_name, business_name, context)),
            ChatMessage::user(message),
        ],
        temperature: Some(config.temperature),
        json_response: false,
    };

    match chat.complete(&request).await {
        Ok(answer) => {
            tracing::info!(chunks = chunks.len(), "generated RAG response");
            answer
        }
        Err(e) => {
            tracing::error!("RAG completion failed: {:#}", e);
            RAG_FAILURE_MESSAGE.to_string()
        }
    }
}
