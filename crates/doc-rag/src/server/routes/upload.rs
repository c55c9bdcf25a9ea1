//! Document upload endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::ingestion::UploadedFile;
use crate::server::state::AppState;
use crate::types::{FileType, IngestResponse};

/// Multipart field names accepted as files
const FILE_FIELDS: [&str; 2] = ["files", "file"];

/// POST /upload - Ingest one or more files
///
/// Extensions are checked before a part's content is read. Every part is
/// read before ingestion starts, so a bad file later in the form rejects the
/// whole batch.
pub async fn upload_documents(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestResponse>> {
    let mut multipart =
        multipart.map_err(|e| Error::InvalidUpload(format!("Expected a multipart form: {}", e)))?;
    let start = Instant::now();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidUpload(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            tracing::debug!("Ignoring form field '{}'", name);
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidUpload(format!("Field '{}' has no filename", name)))?;
        FileType::detect(&filename)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidUpload(format!("Failed to read {}: {}", filename, e)))?;

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        files.push(UploadedFile::new(filename, data));
    }

    let summary = state.ingest_pipeline().ingest(files).await?;
    tracing::info!(
        "Ingested {} files into {} chunks in {:.1}s",
        summary.files,
        summary.chunks_created,
        start.elapsed().as_secs_f64()
    );

    Ok(Json(summary.into()))
}
