//! Configuration for the document Q&A system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Model provider selection and endpoints
    pub provider: ProviderConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Completion model configuration
    pub llm: LlmConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Request deadlines
    pub processing: ProcessingConfig,
    /// Legacy format conversion
    pub conversion: ConversionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
    /// Directory served under `/static` when it exists
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
            static_dir: Some(PathBuf::from("static")),
        }
    }
}

/// Which backend serves embeddings and completions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible HTTP API
    #[serde(alias = "open_ai")]
    OpenAi,
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("Unknown provider '{}'", other))),
        }
    }
}

/// Provider endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Backend kind
    pub kind: ProviderKind,
    /// Ollama base URL
    pub ollama_url: String,
    /// OpenAI API base URL
    pub openai_url: String,
    /// OpenAI API key (usually from OPENAI_API_KEY)
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            openai_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per provider call
    pub batch_size: usize,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// First backoff delay, doubled on every retry
    pub retry_base_delay_ms: u64,
    /// Per-call HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            max_retries: 3,
            retry_base_delay_ms: 500,
            request_timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    /// Backoff delay before the first retry
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Completion model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model used for answers
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-call HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: 0.0,
            request_timeout_secs: 120,
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// How retrieved chunks are selected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Plain top-k by cosine similarity
    #[default]
    Similarity,
    /// Maximal marginal relevance over a larger candidate pool
    Mmr,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks given to the model per question
    pub top_k: usize,
    /// Selection strategy
    pub strategy: RetrievalStrategy,
    /// MMR relevance weight (1.0 = pure relevance)
    pub mmr_lambda: f32,
    /// MMR candidate pool size
    pub mmr_fetch_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            strategy: RetrievalStrategy::Similarity,
            mmr_lambda: 0.5,
            mmr_fetch_k: 20,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// SQLite file holding the index
    pub storage_path: PathBuf,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doc-rag");
        Self {
            storage_path: data_dir.join("index.sqlite3"),
        }
    }
}

/// Request deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Upload deadline in seconds (default: 120)
    pub ingest_timeout_secs: u64,
    /// Question deadline in seconds (default: 60)
    pub query_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ingest_timeout_secs: 120,
            query_timeout_secs: 60,
        }
    }
}

impl ProcessingConfig {
    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Legacy `.doc` conversion via LibreOffice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Allow converting `.doc` uploads
    pub enabled: bool,
    /// LibreOffice executable
    pub libreoffice_binary: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            libreoffice_binary: "libreoffice".to_string(),
        }
    }
}

impl RagConfig {
    /// Load configuration from an optional TOML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `DOC_RAG_*` and `OPENAI_API_KEY` overrides
    fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("DOC_RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("DOC_RAG_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("DOC_RAG_PORT is not a port: {}", port)))?;
        }
        if let Some(path) = var("DOC_RAG_STORAGE_PATH") {
            self.vector_db.storage_path = PathBuf::from(path);
        }
        if let Some(kind) = var("DOC_RAG_PROVIDER") {
            self.provider.kind = kind.parse()?;
        }
        if let Some(url) = var("DOC_RAG_OLLAMA_URL") {
            self.provider.ollama_url = url;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.provider.openai_api_key = Some(key);
        }
        Ok(())
    }

    /// Reject settings the pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.retrieval.mmr_lambda) {
            return Err(Error::Config("retrieval.mmr_lambda must be within [0, 1]".into()));
        }
        if self.embeddings.dimensions == 0 || self.embeddings.batch_size == 0 {
            return Err(Error::Config(
                "embeddings.dimensions and embeddings.batch_size must be positive".into(),
            ));
        }
        if self.processing.ingest_timeout_secs == 0 || self.processing.query_timeout_secs == 0 {
            return Err(Error::Config("processing timeouts must be positive".into()));
        }
        if self.provider.kind == ProviderKind::OpenAi
            && self.provider.openai_api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::Config(
                "provider.kind = \"openai\" requires OPENAI_API_KEY".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.processing.ingest_timeout_secs, 120);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml(
            r#"
            [chunking]
            chunk_size = 1000
            chunk_overlap = 100

            [retrieval]
            strategy = "mmr"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.retrieval.strategy, RetrievalStrategy::Mmr);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = RagConfig::default();
        config.provider.kind = ProviderKind::OpenAi;
        assert!(config.validate().is_err());

        config.provider.openai_api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DOC_RAG_PORT", "9100"),
            ("DOC_RAG_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-env"),
            ("DOC_RAG_STORAGE_PATH", "/tmp/idx.sqlite3"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
        assert_eq!(config.provider.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.vector_db.storage_path, PathBuf::from("/tmp/idx.sqlite3"));
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let mut config = RagConfig::default();
        let result = config.apply_env(|key| (key == "DOC_RAG_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
