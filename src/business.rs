//! Relational store for business records.
//!
//! A single `businesses` table keyed by a short hash identifier. The row is
//! created with empty JSON defaults at upload time and filled in once the
//! language model has produced FAQs, products and business info.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::models::Business;

/// Length of the hex identifier kept from the hash.
const BUSINESS_ID_LEN: usize = 16;

/// Derive a business identifier from its display name and the upload time.
///
/// The same name uploaded twice yields two different businesses.
pub fn generate_business_id(name: &str, now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}", name, now.timestamp_micros()).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..BUSINESS_ID_LEN].to_string()
}

/// Insert a new business with empty FAQ, product and info blobs.
pub async fn add_business(
    pool: &SqlitePool,
    business_id: &str,
    name: &str,
    filename: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO businesses (id, name, original_filename, faqs_json, products_json, business_info_json)
        VALUES (?, ?, ?, '[]', '[]', '{}')
        "#,
    )
    .bind(business_id)
    .bind(name)
    .bind(filename)
    .execute(pool)
    .await?;

    tracing::info!(business_id, name, "added business record");
    Ok(())
}

/// Fields to overwrite in [`update_ai_data`]. `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct AiDataUpdate<'a> {
    pub faqs: Option<&'a [Value]>,
    pub products: Option<&'a [Value]>,
    pub business_info: Option<&'a Value>,
}

/// Store AI-generated data for a business. Returns `false` when there was
/// nothing to update.
pub async fn update_ai_data(
    pool: &SqlitePool,
    business_id: &str,
    update: &AiDataUpdate<'_>,
) -> Result<bool> {
    let mut assignments = Vec::new();
    let mut params = Vec::new();

    if let Some(faqs) = update.faqs {
        assignments.push("faqs_json = ?");
        params.push(serde_json::to_string(faqs)?);
    }
    if let Some(products) = update.products {
        assignments.push("products_json = ?");
        params.push(serde_json::to_string(products)?);
    }
    if let Some(info) = update.business_info {
        assignments.push("business_info_json = ?");
        params.push(serde_json::to_string(info)?);
    }

    if assignments.is_empty() {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE businesses SET {} WHERE id = ?",
        assignments.join(", ")
    );
    let mut query = sqlx::query(&sql);
    for param in &params {
        query = query.bind(param.as_str());
    }
    query.bind(business_id).execute(pool).await?;

    tracing::info!(business_id, "updated AI data");
    Ok(true)
}

pub async fn get_business(pool: &SqlitePool, business_id: &str) -> Result<Option<Business>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, original_filename, faqs_json, products_json, business_info_json
        FROM businesses WHERE id = ?
        "#,
    )
    .bind(business_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Business {
        id: r.get("id"),
        name: r.get("name"),
        original_filename: r.get("original_filename"),
        faqs_json: r.get("faqs_json"),
        products_json: r.get("products_json"),
        business_info_json: r.get("business_info_json"),
    }))
}

/// Delete a business record. Returns whether a row was removed.
pub async fn delete_business(pool: &SqlitePool, business_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM businesses WHERE id = ?")
        .bind(business_id)
        .execute(pool)
        .await?;

    tracing::info!(business_id, "deleted business record");
    Ok(result.rows_affected() > 0)
}
