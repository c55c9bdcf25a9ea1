//! Error types for the document Q&A system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::FileType;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File extension outside the supported set
    #[error(
        "Unsupported file type '.{extension}' for '{filename}' (supported: {supported})",
        supported = FileType::SUPPORTED_EXTENSIONS.join(", ")
    )]
    UnsupportedFormat { filename: String, extension: String },

    /// Parser could not extract any text
    #[error("Failed to extract text from '{filename}': {message}")]
    CorruptDocument { filename: String, message: String },

    /// Malformed upload request
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Empty or malformed question
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding provider failure (retryable)
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Completion provider failure
    #[error("Completion service error: {0}")]
    CompletionService(String),

    /// Vector with the wrong number of components
    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Request deadline exceeded
    #[error("The {operation} request timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    /// Durable index store failure
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unsupported format error
    pub fn unsupported_format(filename: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            filename: filename.into(),
            extension: extension.into(),
        }
    }

    /// Create a corrupt document error
    pub fn corrupt_document(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptDocument {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding service error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingService(message.into())
    }

    /// Create a completion service error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionService(message.into())
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a caller may retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingService(_))
    }

    /// Whether the failure was caused by the request itself
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::CorruptDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidUpload(_) | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::EmbeddingService(_) | Self::CompletionService(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Config(_)
            | Self::DimensionMismatch { .. }
            | Self::VectorIndex(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::CorruptDocument { .. } => "corrupt_document",
            Self::InvalidUpload(_) => "invalid_upload",
            Self::InvalidQuery(_) => "invalid_query",
            Self::EmbeddingService(_) => "embedding_service_error",
            Self::CompletionService(_) => "completion_service_error",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Timeout { .. } => "timeout",
            Self::VectorIndex(_) => "vector_index_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::VectorIndex(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::internal(format!("Task join error: {}", err))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "type": self.error_type(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert!(Error::unsupported_format("a.exe", "exe").is_client_error());
        assert!(Error::corrupt_document("a.pdf", "no text").is_client_error());
        assert!(Error::InvalidQuery("empty".into()).is_client_error());
        assert!(Error::InvalidUpload("no files".into()).is_client_error());
    }

    #[test]
    fn test_provider_errors_map_to_5xx() {
        assert_eq!(Error::embedding("down").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(Error::completion("down").status_code(), StatusCode::BAD_GATEWAY);
        assert!(Error::vector_index("disk").status_code().is_server_error());
    }

    #[test]
    fn test_unsupported_format_lists_extensions() {
        let message = Error::unsupported_format("setup.exe", "exe").to_string();
        assert!(message.contains("'.exe'"), "{}", message);
        assert!(message.ends_with("(supported: pdf, txt, doc, docx, md)"), "{}", message);
    }

    #[test]
    fn test_join_error_is_internal() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err: Error = rt
            .block_on(async { tokio::spawn(async { panic!("boom") }).await })
            .unwrap_err()
            .into();
        assert_eq!(err.error_type(), "internal_error");
    }

    #[test]
    fn test_timeout_is_distinct() {
        let err = Error::Timeout { operation: "query", seconds: 60 };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.error_type(), "timeout");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_embedding_errors_are_retryable() {
        assert!(Error::embedding("busy").is_retryable());
        assert!(!Error::completion("busy").is_retryable());
        assert!(!Error::DimensionMismatch { expected: 3, actual: 2 }.is_retryable());
    }
}
