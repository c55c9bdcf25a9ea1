//! Document and chunk types with source tracking for citations

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Old Microsoft Word document (.doc) - requires LibreOffice
    Doc,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
}

impl FileType {
    /// Recognized upload extensions
    pub const SUPPORTED_EXTENSIONS: [&'static str; 5] = ["pdf", "txt", "doc", "docx", "md"];

    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "txt" => Some(Self::Txt),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a filename, rejecting anything outside the supported set
    pub fn detect(filename: &str) -> Result<Self> {
        let extension = filename.rsplit_once('.').map_or("", |(_, ext)| ext);

        Self::from_extension(extension)
            .ok_or_else(|| Error::unsupported_format(filename, extension.to_lowercase()))
    }

    /// Canonical extension, also used as the stored `file_type` value
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Txt => "txt",
            Self::Markdown => "md",
        }
    }

    /// Whether the format carries real page boundaries
    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Pdf | Self::Docx | Self::Doc)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One uploaded file, alive only while it is being ingested
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename as uploaded by user
    pub filename: String,
    /// Detected format
    pub file_type: FileType,
    /// Raw bytes
    pub data: Bytes,
}

impl Document {
    /// Create a document, detecting its format from the filename
    pub fn new(filename: impl Into<String>, data: Bytes) -> Result<Self> {
        let filename = filename.into();
        let file_type = FileType::detect(&filename)?;
        Ok(Self {
            filename,
            file_type,
            data,
        })
    }

    /// SHA-256 of the raw bytes, hex encoded
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        hex::encode(hasher.finalize())
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A run of extracted text with its 1-indexed page or segment number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub number: u32,
}

impl Segment {
    pub fn new(text: impl Into<String>, number: u32) -> Self {
        Self {
            text: text.into(),
            number,
        }
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSource {
    /// Original filename
    pub filename: String,
    /// Source format
    pub file_type: FileType,
    /// Page or segment number (1-indexed)
    pub page_number: u32,
    /// Number of segments the document produced
    pub total_pages: u32,
}

/// A bounded span of document text, the unit of retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Chunk text (never empty)
    pub content: String,
    /// Source location
    pub source: ChunkSource,
    /// Position within the ingestion batch
    pub chunk_index: u32,
    /// Start character offset within the segment
    pub char_start: usize,
    /// End character offset within the segment (exclusive)
    pub char_end: usize,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(
        content: String,
        source: ChunkSource,
        chunk_index: u32,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            source,
            chunk_index,
            char_start,
            char_end,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Short single-line excerpt for logs
    pub fn preview(&self, max_chars: usize) -> String {
        let flat: String = self
            .content
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .take(max_chars)
            .collect();
        if self.char_len() > max_chars {
            format!("{}...", flat)
        } else {
            flat
        }
    }
}
