//! Ingestion pipeline orchestration
//!
//! Upload batch -> load -> chunk -> embed -> index. Every file is validated
//! before any content is read, and the index only changes once the whole
//! batch has been embedded.

use bytes::Bytes;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::embeddings::EmbeddingClient;
use crate::error::{Error, Result};
use crate::retrieval::{IndexEntry, VectorIndex};
use crate::types::{Chunk, Document, IngestResponse, Segment};

use super::chunker::TextChunker;
use super::loader::DocumentLoader;

/// Chunks logged after each upload
const PREVIEW_CHUNKS: usize = 3;
const PREVIEW_CHARS: usize = 100;

/// A file received from the upload entry point
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Outcome of a successful batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Files in the batch
    pub files: usize,
    /// Chunks committed to the index
    pub chunks_created: usize,
    /// Pages or segments across all files
    pub total_pages: usize,
}

impl From<IngestSummary> for IngestResponse {
    fn from(summary: IngestSummary) -> Self {
        Self {
            message: format!("Successfully processed {} files", summary.files),
            chunks_created: summary.chunks_created,
            total_pages: summary.total_pages,
        }
    }
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    loader: Arc<DocumentLoader>,
    chunker: TextChunker,
    embedder: EmbeddingClient,
    index: Arc<VectorIndex>,
    timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        loader: DocumentLoader,
        chunker: TextChunker,
        embedder: EmbeddingClient,
        index: Arc<VectorIndex>,
        timeout: Duration,
    ) -> Self {
        Self {
            loader: Arc::new(loader),
            chunker,
            embedder,
            index,
            timeout,
        }
    }

    pub fn from_config(
        config: &RagConfig,
        embedder: EmbeddingClient,
        index: Arc<VectorIndex>,
    ) -> Result<Self> {
        Ok(Self::new(
            DocumentLoader::new(config.conversion.clone()),
            TextChunker::from_config(&config.chunking)?,
            embedder,
            index,
            config.processing.ingest_timeout(),
        ))
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Ingest a batch of files, all or nothing
    ///
    /// Loading, chunking and embedding share the ingestion deadline. The
    /// index commit itself is not cancelled once it starts.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestSummary> {
        if files.is_empty() {
            return Err(Error::InvalidUpload("no files were uploaded".into()));
        }

        let documents = files
            .into_iter()
            .map(|f| Document::new(f.filename, f.data))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Ingesting {} files: {}",
            documents.len(),
            documents
                .iter()
                .map(|d| d.filename.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let file_count = documents.len();
        let seconds = self.timeout.as_secs();
        let (entries, total_pages) = tokio::time::timeout(self.timeout, self.prepare(documents))
            .await
            .map_err(|_| Error::Timeout {
                operation: "ingestion",
                seconds,
            })
            .and_then(|prepared| prepared)
            .inspect_err(|e| tracing::error!("Ingestion batch aborted: {}", e))?;

        tracing::info!("Adding {} chunks to vector index", entries.len());
        let chunks_created = self.index.add_async(entries).await?;

        Ok(IngestSummary {
            files: file_count,
            chunks_created,
            total_pages,
        })
    }

    /// Load, chunk and embed without touching the index
    async fn prepare(&self, documents: Vec<Document>) -> Result<(Vec<IndexEntry>, usize)> {
        let loaded = try_join_all(documents.into_iter().map(|doc| {
            let loader = Arc::clone(&self.loader);
            async move {
                tokio::task::spawn_blocking(move || {
                    let segments = loader.load(&doc)?;
                    tracing::info!(
                        "Loaded {} ({}, {} segments, {} bytes)",
                        doc.filename,
                        doc.file_type,
                        segments.len(),
                        doc.size()
                    );
                    tracing::debug!("{} sha256 {}", doc.filename, doc.content_hash());
                    Ok::<_, Error>((doc, segments))
                })
                .await?
            }
        }))
        .await?;

        let total_pages = loaded.iter().map(|(_, segments)| segments.len()).sum();
        let chunks = self.chunk_all(&loaded);
        if chunks.is_empty() {
            return Err(Error::InvalidUpload(
                "no documents produced any text to index".into(),
            ));
        }

        for (i, chunk) in chunks.iter().take(PREVIEW_CHUNKS).enumerate() {
            tracing::info!("Chunk {} preview: {}", i + 1, chunk.preview(PREVIEW_CHARS));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let entries = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| IndexEntry::new(vector, chunk))
            .collect();

        Ok((entries, total_pages))
    }

    fn chunk_all(&self, loaded: &[(Document, Vec<Segment>)]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (doc, segments) in loaded {
            let first_index = chunks.len() as u32;
            let doc_chunks =
                self.chunker
                    .chunk_document(&doc.filename, doc.file_type, segments, first_index);
            tracing::debug!("Split {} into {} chunks", doc.filename, doc_chunks.len());
            chunks.extend(doc_chunks);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::RetryPolicy;
    use crate::providers::EmbeddingProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "counting"
        }
        fn model(&self) -> &str {
            "counting"
        }
    }

    fn pipeline() -> (IngestPipeline, Arc<CountingEmbedder>) {
        let provider = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let embedder = EmbeddingClient::new(
            provider.clone(),
            16,
            RetryPolicy::new(0, Duration::from_millis(1)),
        );
        let index = Arc::new(VectorIndex::in_memory(2).unwrap());
        let pipeline = IngestPipeline::new(
            DocumentLoader::default(),
            TextChunker::new(500, 50).unwrap(),
            embedder,
            index,
            Duration::from_secs(30),
        );
        (pipeline, provider)
    }

    #[tokio::test]
    async fn test_ingest_text_and_markdown() {
        let (pipeline, _) = pipeline();
        let summary = pipeline
            .ingest(vec![
                UploadedFile::new("a.txt", "Plain text notes."),
                UploadedFile::new("b.md", "# Title\n\nSome *markdown* body."),
            ])
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.chunks_created, 2);
        assert_eq!(summary.total_pages, 2);
        assert_eq!(pipeline.index().len(), 2);

        let response = IngestResponse::from(summary);
        assert_eq!(response.message, "Successfully processed 2 files");
    }

    #[tokio::test]
    async fn test_chunk_indexes_run_across_files() {
        let (pipeline, _) = pipeline();
        pipeline
            .ingest(vec![
                UploadedFile::new("one.txt", "first file"),
                UploadedFile::new("two.txt", "second file"),
            ])
            .await
            .unwrap();

        let mut indexes: Vec<u32> = pipeline
            .index()
            .search(&[1.0, 1.0], 10)
            .unwrap()
            .iter()
            .map(|h| h.chunk.chunk_index)
            .collect();
        indexes.sort_unstable();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let (pipeline, _) = pipeline();
        assert!(matches!(
            pipeline.ingest(Vec::new()).await,
            Err(Error::InvalidUpload(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_file_rejects_batch_before_embedding() {
        let (pipeline, provider) = pipeline();
        let result = pipeline
            .ingest(vec![
                UploadedFile::new("ok.txt", "fine"),
                UploadedFile::new("setup.exe", b"MZ".to_vec()),
            ])
            .await;

        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.index().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_rejects_batch() {
        let (pipeline, provider) = pipeline();
        let result = pipeline
            .ingest(vec![
                UploadedFile::new("ok.txt", "fine"),
                UploadedFile::new("blank.txt", "   \n\t "),
            ])
            .await;

        assert!(matches!(result, Err(Error::CorruptDocument { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.index().is_empty());
    }
}
