//! HTTP routes for uploads, questions and status

pub mod query;
pub mod upload;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build the document routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(status))
        .route(
            "/upload",
            post(upload::upload_documents).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", post(query::query_documents))
}

/// GET / - Service status
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "RAG system is running",
        "indexed_chunks": state.index().len(),
    }))
}
