//! Shared application context.
//!
//! Opens both stores and builds the model providers once. The HTTP server
//! holds it as router state; the CLI builds one per command.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::llm::{self, ChatProvider};
use crate::migrate;
use crate::vector_store::VectorStore;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub vectors: Arc<VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub chat: Arc<dyn ChatProvider>,
}

impl AppContext {
    /// Connect, migrate and build the configured providers.
    pub async fn new(config: Config) -> Result<Self> {
        let embedder = embedding::create_provider(&config)?;
        let chat = llm::create_chat_provider(&config)?;
        Self::with_providers(config, embedder, chat).await
    }

    /// Like [`AppContext::new`] but with caller-supplied providers.
    pub async fn with_providers(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let pool = db::connect(&config)
            .await
            .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
        migrate::migrate(&pool).await?;

        let vectors = VectorStore::open(&config.vector_store).await.with_context(|| {
            format!(
                "Failed to open vector store {}",
                config.vector_store.path.display()
            )
        })?;

        tracing::info!(
            embedding_model = embedder.model_name(),
            chat_model = chat.model_name(),
            "application context ready"
        );

        Ok(Self {
            config: Arc::new(config),
            pool,
            vectors: Arc::new(vectors),
            embedder,
            chat,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        self.vectors.close().await;
    }
}
