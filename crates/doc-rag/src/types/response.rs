//! Response types for uploads and queries

use serde::{Deserialize, Serialize};

use super::document::{Chunk, FileType};

/// Citation metadata for a retrieved passage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceMetadata {
    /// Source filename
    pub file_name: String,
    /// File type
    pub file_type: FileType,
    /// Page or segment number (1-indexed)
    pub page_number: u32,
    /// Pages in the source document
    pub total_pages: u32,
    /// Position within its ingestion batch
    pub chunk_index: u32,
}

/// A passage used to ground the answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// Exact chunk text
    pub content: String,
    /// Where the passage lives
    pub metadata: SourceMetadata,
    /// Cosine similarity to the question
    pub similarity: f32,
}

impl Source {
    /// Create a source from a retrieved chunk and its score
    pub fn from_chunk(chunk: &Chunk, similarity: f32) -> Self {
        Self {
            content: chunk.content.clone(),
            metadata: SourceMetadata {
                file_name: chunk.source.filename.clone(),
                file_type: chunk.source.file_type,
                page_number: chunk.source.page_number,
                total_pages: chunk.source.total_pages,
                chunk_index: chunk.chunk_index,
            },
            similarity,
        }
    }
}

/// Response from a RAG query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Generated answer
    pub answer: String,
    /// Passages given to the model, most similar first
    pub sources: Vec<Source>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Response from document ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Human-readable summary
    pub message: String,
    /// Chunks committed to the index
    pub chunks_created: usize,
    /// Pages or segments across all files
    pub total_pages: usize,
}
