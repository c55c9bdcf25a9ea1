//! OpenAI-compatible providers for embeddings and chat completion

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::CompletionProvider;
use super::ollama::describe_request_error;

/// Authenticated client for the OpenAI REST API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key must not be empty".into()));
        }

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> std::result::Result<std::result::Result<reqwest::Response, String>, reqwest::Error> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(Ok(response));
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Ok(Err(format!("API returned {}: {}", status, detail)))
    }

    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;
        Ok(matches!(response, Ok(r) if r.status().is_success()))
    }

    pub async fn embed(&self, model: &str, texts: &[String], timeout: Duration) -> Result<Vec<Vec<f32>>> {
        let response = self
            .post("/embeddings", &EmbeddingRequest { model, input: texts }, timeout)
            .await
            .map_err(|e| Error::embedding(describe_request_error("Embedding request", &e, timeout)))?
            .map_err(Error::embedding)?;

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn chat(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        let request = ChatRequest {
            model,
            temperature,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .post("/chat/completions", &request, timeout)
            .await
            .map_err(|e| Error::completion(describe_request_error("Chat request", &e, timeout)))?
            .map_err(Error::completion)?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::completion(format!("Failed to parse chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| Error::completion("Chat response had no choices"))
    }
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn from_client(client: Arc<OpenAiClient>, config: &RagConfig) -> Self {
        Self {
            client,
            model: config.embeddings.model.clone(),
            dimensions: config.embeddings.dimensions,
            timeout: Duration::from_secs(config.embeddings.request_timeout_secs),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
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
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat completion provider
pub struct OpenAiLlm {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiLlm {
    pub fn from_client(client: Arc<OpenAiClient>, config: &RagConfig) -> Self {
        Self {
            client,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with model: {}", self.model);
        self.client
            .chat(&self.model, prompt, self.temperature, self.timeout)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
