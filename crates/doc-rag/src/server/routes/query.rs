//! Question endpoint

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /query - Answer a question from the uploaded documents
///
/// Takes `question` as a urlencoded or multipart form field, or as JSON.
pub async fn query_documents(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<QueryResponse>> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let query = if content_type.starts_with("application/json") {
        Json::<QueryRequest>::from_request(request, &())
            .await
            .map(|Json(q)| q)
            .map_err(|e| Error::InvalidQuery(e.body_text()))?
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| Error::InvalidQuery(e.body_text()))?;
        read_multipart_question(multipart).await?
    } else {
        Form::<QueryRequest>::from_request(request, &())
            .await
            .map(|Form(q)| q)
            .map_err(|e| Error::InvalidQuery(e.body_text()))?
    };

    let response = state.query_pipeline().query(&query.question).await?;
    Ok(Json(response))
}

async fn read_multipart_question(mut multipart: Multipart) -> Result<QueryRequest> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidQuery(format!("Failed to read form field: {}", e)))?
    {
        if field.name() == Some("question") {
            let question = field
                .text()
                .await
                .map_err(|e| Error::InvalidQuery(format!("Failed to read question: {}", e)))?;
            return Ok(QueryRequest::new(question));
        }
    }
    Ok(QueryRequest::default())
}
