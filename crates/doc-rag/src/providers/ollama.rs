//! Ollama-based providers for embeddings and completion

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::CompletionProvider;

/// Thin Ollama HTTP API client shared by the embedder and the LLM provider
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch with `/api/embed`
    pub async fn embed(&self, model: &str, texts: &[String], timeout: Duration) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&EmbedRequest { model, input: texts })
            .send()
            .await
            .map_err(|e| Error::embedding(describe_request_error("Embedding request", &e, timeout)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Embedding failed: HTTP {} - {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        Ok(embed_response.embeddings)
    }

    /// Non-streaming completion with `/api/generate`
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::completion(describe_request_error("Generation request", &e, timeout)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::completion(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::completion(format!("Failed to parse generation response: {}", e)))?;

        Ok(generate_response.response)
    }
}

pub(crate) fn describe_request_error(what: &str, err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("{} timed out after {}s", what, timeout.as_secs())
    } else {
        format!("{} failed: {}", what, err)
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn from_client(client: Arc<OllamaClient>, config: &RagConfig) -> Self {
        Self {
            client,
            model: config.embeddings.model.clone(),
            dimensions: config.embeddings.dimensions,
            timeout: Duration::from_secs(config.embeddings.request_timeout_secs),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!("Embedding {} texts with {}", texts.len(), self.model);
        self.client.embed(&self.model, texts, self.timeout).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaLlm {
    pub fn from_client(client: Arc<OllamaClient>, config: &RagConfig) -> Self {
        Self {
            client,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with model: {}", self.model);
        self.client
            .generate(&self.model, prompt, self.temperature, self.timeout)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
