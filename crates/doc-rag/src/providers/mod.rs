//! Provider abstractions for embeddings and completion
//!
//! The pipelines only see the `EmbeddingProvider` and `CompletionProvider`
//! traits, so the backend can switch between a local Ollama server and an
//! OpenAI-compatible API through configuration.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

pub use embedding::EmbeddingProvider;
pub use llm::CompletionProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use openai::{OpenAiClient, OpenAiEmbedder, OpenAiLlm};

use crate::config::{ProviderKind, RagConfig};
use crate::error::{Error, Result};

/// Build the configured embedding and completion providers
pub fn build_providers(
    config: &RagConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn CompletionProvider>)> {
    match config.provider.kind {
        ProviderKind::Ollama => {
            let client = Arc::new(OllamaClient::new(&config.provider.ollama_url)?);
            Ok((
                Arc::new(OllamaEmbedder::from_client(Arc::clone(&client), config)),
                Arc::new(OllamaLlm::from_client(client, config)),
            ))
        }
        ProviderKind::OpenAi => {
            let key = config
                .provider
                .openai_api_key
                .clone()
                .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".into()))?;
            let client = Arc::new(OpenAiClient::new(&config.provider.openai_url, key)?);
            Ok((
                Arc::new(OpenAiEmbedder::from_client(Arc::clone(&client), config)),
                Arc::new(OpenAiLlm::from_client(client, config)),
            ))
        }
    }
}
