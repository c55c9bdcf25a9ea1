//! Test doubles for the model providers

#![allow(dead_code)]

use async_trait::async_trait;
use doc_rag::config::RagConfig;
use doc_rag::error::{Error, Result};
use doc_rag::providers::{CompletionProvider, EmbeddingProvider};
use doc_rag::server::state::AppState;
use doc_rag::VectorIndex;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DIMS: usize = 1024;

/// Bag-of-words embedding: each lowercase word bumps one hashed bucket
pub fn bag_of_words(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0; dims];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() % dims as u64) as usize] += 1.0;
    }
    v
}

/// Deterministic embedder that can fail on a chosen call
pub struct HashEmbedder {
    pub calls: AtomicUsize,
    /// 0-based call number that fails, if any
    pub fail_on_call: Option<usize>,
    pub delay: Option<Duration>,
}

impl HashEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            delay: None,
        })
    }

    pub fn failing_on(call: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
            delay: None,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            delay: Some(delay),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on_call == Some(call) {
            return Err(Error::Config("embedding model rejected the batch".into()));
        }
        Ok(texts.iter().map(|t| bag_of_words(t, DIMS)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }

    fn model(&self) -> &str {
        "hash-bag-of-words"
    }
}

/// Completion provider that records prompts and returns a fixed reply
pub struct RecordingLlm {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    pub fail: bool,
}

impl RecordingLlm {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            delay: None,
            fail: false,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: "late".to_string(),
            prompts: Mutex::new(Vec::new()),
            delay: Some(delay),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: String::new(),
            prompts: Mutex::new(Vec::new()),
            delay: None,
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for RecordingLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::completion("model unavailable"));
        }
        Ok(self.reply.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "recording"
    }
}

/// Config with fast retries and no static directory
pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embeddings.dimensions = DIMS;
    config.embeddings.retry_base_delay_ms = 1;
    config.embeddings.max_retries = 1;
    config.server.static_dir = None;
    config
}

/// State over an in-memory index
pub fn state_with(
    config: RagConfig,
    embedder: Arc<HashEmbedder>,
    llm: Arc<RecordingLlm>,
) -> AppState {
    let index = Arc::new(VectorIndex::in_memory(DIMS).unwrap());
    AppState::with_components(config, embedder, llm, index).unwrap()
}

/// Repeating filler prose of exactly `len` characters
pub fn prose(len: usize) -> String {
    let words = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do \
                 eiusmod tempor incididunt ut labore et dolore magna aliqua ";
    words.repeat(len / words.len() + 1).chars().take(len).collect()
}
