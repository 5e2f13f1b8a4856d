use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::vector_store::VectorStore;

/// Create the `businesses` table. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS businesses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            original_filename TEXT,
            faqs_json TEXT,
            products_json TEXT,
            business_info_json TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize both the relational store and the vector collection.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;

    let store = VectorStore::open(&config.vector_store).await?;
    store.close().await;

    Ok(())
}
