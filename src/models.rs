//! Core data models used throughout bizdesk.
//!
//! These types represent the business records, vector entries, and
//! AI-generated data that flow through the upload and chat pipeline.

use serde::Serialize;
use serde_json::Value;

/// A row of the `businesses` table.
///
/// The three `*_json` fields hold serialized JSON exactly as stored; use the
/// accessor methods to decode them. Decoding never fails: a NULL or corrupted
/// blob reads back as an empty list (or an empty object for business info).
#[derive(Debug, Clone)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub original_filename: Option<String>,
    pub faqs_json: Option<String>,
    pub products_json: Option<String>,
    pub business_info_json: Option<String>,
}

impl Business {
    pub fn faqs(&self) -> Vec<Value> {
        decode_list(&self.id, "faqs_json", self.faqs_json.as_deref())
    }

    pub fn products(&self) -> Vec<Value> {
        decode_list(&self.id, "products_json", self.products_json.as_deref())
    }

    pub fn business_info(&self) -> Value {
        let raw = match self.business_info_json.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return empty_object(),
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    business_id = %self.id,
                    "corrupted business_info_json, returning empty object"
                );
                empty_object()
            }
        }
    }
}

fn decode_list(business_id: &str, column: &str, raw: Option<&str>) -> Vec<Value> {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Vec::new(),
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) | Err(_) => {
            tracing::warn!(business_id, column, "corrupted JSON column, returning empty list");
            Vec::new()
        }
    }
}

pub fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One embedded chunk of an uploaded document.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// `{business_id}_{filename}_{chunk_index}`.
    pub id: String,
    pub business_id: String,
    pub filename: String,
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl VectorEntry {
    pub fn composite_id(business_id: &str, filename: &str, chunk_index: usize) -> String {
        format!("{}_{}_{}", business_id, filename, chunk_index)
    }
}

/// Products and business facts pulled out of a document by the language model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractedBusinessData {
    pub products: Vec<Value>,
    pub business_info: Value,
}

impl Default for ExtractedBusinessData {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            business_info: empty_object(),
        }
    }
}
