//! HTTP routes exercised through the router without a listener

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{state_with, test_config, HashEmbedder, RecordingLlm};
use doc_rag::server::RagServer;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "doc-rag-test-boundary";

fn router(llm_reply: &str) -> Router {
    let state = state_with(test_config(), HashEmbedder::new(), RecordingLlm::replying(llm_reply));
    RagServer::from_state(state).build_router()
}

fn multipart_body(parts: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, data) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[(&str, &str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn form_query(question: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("question={}", question.replace(' ', "+"))))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn status_route_reports_running() {
    let response = router("x")
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "RAG system is running");
    assert_eq!(body["indexed_chunks"], 0);
}

#[tokio::test]
async fn health_route() {
    let response = router("x")
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn upload_then_query() {
    let app = router("The warranty lasts two years [1].");

    let response = app
        .clone()
        .oneshot(upload_request(&[
            ("files", "warranty.txt", "The warranty lasts two years from delivery."),
            ("files", "notes.md", "# Notes\n\nUnrelated meeting notes."),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Successfully processed 2 files");
    assert_eq!(body["chunks_created"], 2);
    assert_eq!(body["total_pages"], 2);

    let response = app
        .oneshot(form_query("How long does the warranty last?"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["answer"], "The warranty lasts two years [1].");
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["metadata"]["file_name"], "warranty.txt");
    assert_eq!(sources[0]["metadata"]["page_number"], 1);
    assert_eq!(sources[0]["content"], "The warranty lasts two years from delivery.");
}

#[tokio::test]
async fn unsupported_upload_is_415() {
    let app = router("x");
    let response = app
        .clone()
        .oneshot(upload_request(&[("files", "tool.exe", "MZ")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = json_body(response).await;
    assert_eq!(body["type"], "unsupported_format");

    let status = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(status).await["indexed_chunks"], 0);
}

#[tokio::test]
async fn unsupported_extension_rejected_before_content_is_read() {
    // The part's body never terminates, so reading it would fail as a bad upload
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"huge.exe\"\r\nContent-Type: application/octet-stream\r\n\r\nMZ\x00\x01"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = router("x").oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json_body(response).await["type"], "unsupported_format");
}

#[tokio::test]
async fn upload_without_files_is_400() {
    let response = router("x")
        .oneshot(upload_request(&[("other", "ignored.txt", "data")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["type"], "invalid_upload");
}

#[tokio::test]
async fn empty_question_is_400() {
    let response = router("x").oneshot(form_query("  ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["type"], "invalid_query");
}

#[tokio::test]
async fn json_query_on_empty_index() {
    let request = Request::builder()
        .method("POST")
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"Is anything indexed?"}"#))
        .unwrap();

    let response = router("").oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sources"].as_array().unwrap().len(), 0);
    assert_eq!(body["answer"], doc_rag::generation::NO_CONTEXT_ANSWER);
}
