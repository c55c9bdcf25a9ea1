//! doc-rag: question answering over uploaded documents
//!
//! Uploaded PDF, Word, text and Markdown files are split into overlapping
//! chunks, embedded and kept in a persistent vector index. Questions are
//! answered by a language model grounded on the most similar chunks, and
//! the passages used are returned alongside the answer.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{IngestPipeline, UploadedFile};
pub use retrieval::{QueryPipeline, VectorIndex};
pub use types::{
    document::{Chunk, ChunkSource, Document, FileType},
    query::QueryRequest,
    response::{IngestResponse, QueryResponse, Source},
};
