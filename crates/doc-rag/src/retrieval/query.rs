//! Question answering over the vector index

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RagConfig;
use crate::embeddings::EmbeddingClient;
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, NO_CONTEXT_ANSWER};
use crate::providers::CompletionProvider;
use crate::types::{QueryResponse, Source};

use super::index::{SearchMode, VectorIndex};

/// Embed the question, retrieve, prompt, complete
pub struct QueryPipeline {
    embedder: EmbeddingClient,
    llm: Arc<dyn CompletionProvider>,
    index: Arc<VectorIndex>,
    top_k: usize,
    mode: SearchMode,
    timeout: Duration,
}

impl QueryPipeline {
    pub fn new(
        embedder: EmbeddingClient,
        llm: Arc<dyn CompletionProvider>,
        index: Arc<VectorIndex>,
        top_k: usize,
        mode: SearchMode,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            llm,
            index,
            top_k,
            mode,
            timeout,
        }
    }

    pub fn from_config(
        config: &RagConfig,
        embedder: EmbeddingClient,
        llm: Arc<dyn CompletionProvider>,
        index: Arc<VectorIndex>,
    ) -> Self {
        Self::new(
            embedder,
            llm,
            index,
            config.retrieval.top_k,
            SearchMode::from_config(&config.retrieval),
            config.processing.query_timeout(),
        )
    }

    /// Answer `question` from the indexed documents
    ///
    /// An empty index is not an error: the model is still asked, without
    /// context, and `sources` comes back empty.
    pub async fn query(&self, question: &str) -> Result<QueryResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidQuery("question must not be empty".into()));
        }

        let start = Instant::now();
        tracing::info!("Processing query: {}", question);

        let seconds = self.timeout.as_secs();
        let mut response = tokio::time::timeout(self.timeout, self.answer(question))
            .await
            .map_err(|_| Error::Timeout {
                operation: "query",
                seconds,
            })??;

        response.processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Query answered in {}ms with {} sources",
            response.processing_time_ms,
            response.sources.len()
        );
        Ok(response)
    }

    async fn answer(&self, question: &str) -> Result<QueryResponse> {
        let query_vector = self.embedder.embed_one(question).await?;
        let hits = self
            .index
            .search_async(query_vector, self.top_k, self.mode)
            .await?;
        if hits.is_empty() {
            tracing::warn!("No indexed chunks matched; answering without context");
        } else {
            tracing::debug!("Retrieved {} chunks", hits.len());
        }

        let prompt = PromptBuilder::build_grounding_prompt(question, &hits);
        let completion = self.llm.complete(&prompt).await?;

        let answer = match completion.trim() {
            "" if hits.is_empty() => NO_CONTEXT_ANSWER.to_string(),
            "" => return Err(Error::completion("Model returned an empty answer")),
            text => text.to_string(),
        };
        tracing::info!("Answer preview: {}", answer.chars().take(100).collect::<String>());

        Ok(QueryResponse {
            answer,
            sources: hits
                .iter()
                .map(|h| Source::from_chunk(&h.chunk, h.similarity))
                .collect(),
            processing_time_ms: 0,
        })
    }
}
