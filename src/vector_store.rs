//! Persistent vector collection for document chunks.
//!
//! Embeddings live in their own SQLite database as little-endian f32 BLOBs,
//! one row per chunk, tagged with the collection name and owning business.
//! Queries load the business's vectors and rank them by cosine similarity
//! in Rust; collections are small enough (one business's uploads) that a
//! brute-force scan is fine.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::VectorStoreConfig;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::VectorEntry;

pub struct VectorStore {
    pool: SqlitePool,
    collection: String,
}

impl VectorStore {
    /// Open the collection database, creating the table if needed.
    pub async fn open(config: &VectorStoreConfig) -> Result<Self> {
        let pool = db::connect_path(&config.path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vector_entries (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                business_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_vector_entries_business ON vector_entries(collection, business_id)",
        )
        .execute(&pool)
        .await?;

        tracing::info!(collection = %config.collection, "vector collection loaded");

        Ok(Self {
            pool,
            collection: config.collection.clone(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Insert or replace entries by id. Returns the number written.
    pub async fn add_entries(&self, entries: &[VectorEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO vector_entries
                    (id, collection, business_id, filename, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&self.collection)
            .bind(&entry.business_id)
            .bind(&entry.filename)
            .bind(entry.chunk_index)
            .bind(&entry.text)
            .bind(embedding::vec_to_blob(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(entries.len())
    }

    /// Texts of the `k` entries of `business_id` most similar to `query_vec`.
    pub async fn query(
        &self,
        business_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT text, embedding FROM vector_entries WHERE collection = ? AND business_id = ?",
        )
        .bind(&self.collection)
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, String)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                (embedding::cosine_similarity(query_vec, &vec), row.get("text"))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, text)| text).collect())
    }

    pub async fn count_for_business(&self, business_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM vector_entries WHERE collection = ? AND business_id = ?",
        )
        .bind(&self.collection)
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Remove every entry of a business. Returns the number of rows deleted.
    pub async fn delete_business(&self, business_id: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM vector_entries WHERE collection = ? AND business_id = ?")
                .bind(&self.collection)
                .bind(business_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Embed `chunks` one at a time and store the ones that succeed.
///
/// Chunks whose embedding fails are skipped with a warning. Returns the
/// number of entries stored, zero when nothing could be embedded.
pub async fn index_document(
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    business_id: &str,
    filename: &str,
    chunks: &[String],
) -> Result<usize> {
    tracing::info!(business_id, filename, chunks = chunks.len(), "embedding chunks");

    let mut entries = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        match embedder.embed_text(chunk).await {
            Ok(vec) => entries.push(VectorEntry {
                id: VectorEntry::composite_id(business_id, filename, i),
                business_id: business_id.to_string(),
                filename: filename.to_string(),
                chunk_index: i as i64,
                text: chunk.clone(),
                embedding: vec,
            }),
            Err(e) => {
                tracing::warn!(business_id, chunk = i, "skipping chunk, embedding failed: {:#}", e);
            }
        }
    }

    if entries.is_empty() {
        tracing::warn!(business_id, filename, "no embeddings generated, nothing stored");
        return Ok(0);
    }

    let stored = store.add_entries(&entries).await?;
    tracing::info!(business_id, filename, stored, "stored chunk embeddings");
    Ok(stored)
}

/// Top-`k` chunk texts for `query`, or an empty list if anything fails.
pub async fn retrieve(
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    business_id: &str,
    query: &str,
    k: usize,
) -> Vec<String> {
    let query_vec = match embedder.embed_text(query).await {
        Ok(vec) => vec,
        Err(e) => {
            tracing::error!(business_id, "failed to embed query: {:#}", e);
            return Vec::new();
        }
    };

    match store.query(business_id, &query_vec, k).await {
        Ok(chunks) => {
            tracing::info!(business_id, retrieved = chunks.len(), "retrieved chunks");
            chunks
        }
        Err(e) => {
            tracing::error!(business_id, "vector query failed: {:#}", e);
            Vec::new()
        }
    }
}
