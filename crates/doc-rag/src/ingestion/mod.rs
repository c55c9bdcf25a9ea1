//! Document ingestion pipeline with multi-format loading

mod chunker;
mod convert;
mod loader;
mod pipeline;

pub use chunker::{TextChunker, TextSpan};
pub use convert::LibreOfficeConverter;
pub use loader::DocumentLoader;
pub use pipeline::{IngestPipeline, IngestSummary, UploadedFile};
