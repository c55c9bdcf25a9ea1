//! Application state for the RAG server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::embeddings::EmbeddingClient;
use crate::error::Result;
use crate::ingestion::IngestPipeline;
use crate::providers::{self, CompletionProvider, EmbeddingProvider};
use crate::retrieval::{QueryPipeline, VectorIndex};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    /// Shared by both pipelines
    index: Arc<VectorIndex>,
    ingest: IngestPipeline,
    query: QueryPipeline,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    llm_provider: Arc<dyn CompletionProvider>,
}

impl AppState {
    /// Build providers from the configuration and open the persistent index
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing RAG application state (provider: {:?})...",
            config.provider.kind
        );

        let (embedding_provider, llm_provider) = providers::build_providers(&config)?;
        tracing::info!(
            "Providers initialized ({} embeddings via {}, answers via {})",
            embedding_provider.model(),
            embedding_provider.name(),
            llm_provider.model()
        );

        let path = config.vector_db.storage_path.clone();
        let dimensions = config.embeddings.dimensions;
        let model = config.embeddings.model.clone();
        let index = tokio::task::spawn_blocking(move || VectorIndex::open(path, dimensions, &model))
            .await??;

        Self::with_components(config, embedding_provider, llm_provider, Arc::new(index))
    }

    /// Assemble state from existing components
    pub fn with_components(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn CompletionProvider>,
        index: Arc<VectorIndex>,
    ) -> Result<Self> {
        let embedder = EmbeddingClient::from_config(Arc::clone(&embedding_provider), &config.embeddings);
        let ingest = IngestPipeline::from_config(&config, embedder.clone(), Arc::clone(&index))?;
        let query = QueryPipeline::from_config(
            &config,
            embedder,
            Arc::clone(&llm_provider),
            Arc::clone(&index),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                index,
                ingest,
                query,
                embedding_provider,
                llm_provider,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.inner.index
    }

    pub fn ingest_pipeline(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.inner.query
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    pub fn llm_provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.inner.llm_provider
    }
}
