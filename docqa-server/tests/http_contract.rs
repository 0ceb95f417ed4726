use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request};
use docqa_rag::{
    HashEmbeddingProvider, InMemoryChunkStore, RagError, RagPipeline, Result as RagResult,
    TextGenerator,
};
use docqa_server::{
    AppState, app_router,
    protocol::{ErrorBody, HealthResponse, QueryResponse, UploadResponse},
};
use docqa_telemetry::{CaptureLayer, EventCapture};
use serde_json::Value;
use tower::ServiceExt;
use tracing_subscriber::layer::SubscriberExt;

const MAX_UPLOAD: usize = 1024 * 1024;

/// Replies with the number of context characters it was given.
struct CountingGenerator;

#[async_trait]
impl TextGenerator for CountingGenerator {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        Ok(format!("prompt had {} characters", prompt.chars().count()))
    }
}

/// Always fails, as an unreachable model server would.
struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, _prompt: &str) -> RagResult<String> {
        Err(RagError::GenerationError {
            backend: "offline".into(),
            message: "connection refused".into(),
        })
    }
}

fn pipeline(generator: Arc<dyn TextGenerator>) -> Arc<RagPipeline> {
    let store = Arc::new(InMemoryChunkStore::new(Arc::new(HashEmbeddingProvider::default())));
    Arc::new(RagPipeline::builder().store(store).generator(generator).build().expect("pipeline"))
}

async fn spawn_server(generator: Arc<dyn TextGenerator>) -> (String, tokio::task::JoinHandle<()>) {
    let app = app_router(AppState::new(pipeline(generator)), MAX_UPLOAD);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

fn file_form(name: &str, contents: impl Into<Vec<u8>>) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(contents.into()).file_name(name.to_string());
    reqwest::multipart::Form::new().part("file", part)
}

fn manual_text() -> String {
    "The reset button sits behind the rear panel. ".repeat(30)
}

#[tokio::test]
async fn health_reports_healthy() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;

    let response = reqwest::get(format!("{}/health", base)).await.expect("health response");
    assert!(response.status().is_success());
    let body: HealthResponse = response.json().await.expect("health json");
    assert_eq!(body, HealthResponse::healthy());

    handle.abort();
}

#[tokio::test]
async fn upload_then_query_answers_from_document() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;
    let client = reqwest::Client::new();

    let text = manual_text();
    let upload = client
        .post(format!("{}/upload", base))
        .multipart(file_form("manual.txt", text.clone()))
        .send()
        .await
        .expect("upload response");
    assert!(upload.status().is_success());

    let uploaded: UploadResponse = upload.json().await.expect("upload json");
    assert_eq!(uploaded.name, "manual.txt");
    assert_eq!(uploaded.size, text.len());
    assert_eq!(uploaded.chunk_count, 3);
    assert_eq!(uploaded.stored_count, 3);
    assert_eq!(uploaded.message, "Document uploaded and processed successfully");
    assert!(!uploaded.id.is_empty());

    let query = client
        .post(format!("{}/query", base))
        .json(&serde_json::json!({"query": "Where is the reset button?"}))
        .send()
        .await
        .expect("query response");
    assert!(query.status().is_success());

    let answered: QueryResponse = query.json().await.expect("query json");
    assert!(answered.answer.starts_with("prompt had "));
    assert!(answered.query_time >= 0.0);

    handle.abort();
}

#[tokio::test]
async fn blank_upload_is_bad_request() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload", base))
        .multipart(file_form("empty.txt", "   \n"))
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: ErrorBody = response.json().await.expect("error json");
    assert!(body.detail.contains("no readable text"));

    handle.abort();
}

#[tokio::test]
async fn unnamed_file_part_is_sniffed() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;
    let client = reqwest::Client::new();

    let part = reqwest::multipart::Part::bytes(manual_text().into_bytes());
    let response = client
        .post(format!("{}/upload", base))
        .multipart(reqwest::multipart::Form::new().part("file", part))
        .send()
        .await
        .expect("upload response");
    assert!(response.status().is_success());

    let uploaded: UploadResponse = response.json().await.expect("upload json");
    assert_eq!(uploaded.name, docqa_server::server::UNNAMED_UPLOAD);
    assert_eq!(uploaded.stored_count, 3);

    handle.abort();
}

#[tokio::test]
async fn corrupt_pdf_is_bad_request() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload", base))
        .multipart(file_form("broken.pdf", b"not a pdf at all".to_vec()))
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let response = client
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.expect("error json");
    assert!(body["detail"].as_str().unwrap_or_default().contains("file"));

    handle.abort();
}

#[tokio::test]
async fn zero_top_k_is_bad_request() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/query", base))
        .json(&serde_json::json!({"query": "anything", "top_k": 0}))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn generator_failure_is_bad_gateway() {
    let (base, handle) = spawn_server(Arc::new(OfflineGenerator)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/query", base))
        .json(&serde_json::json!({"query": "anything"}))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    let body: ErrorBody = response.json().await.expect("error json");
    assert!(body.detail.contains("connection refused"));

    handle.abort();
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let (base, handle) = spawn_server(Arc::new(CountingGenerator)).await;

    let response = reqwest::Client::new()
        .get(format!("{}/health", base))
        .header("Origin", "http://example.test")
        .send()
        .await
        .expect("health response");
    let allow = response
        .headers()
        .get("access-control-allow-origin")
        .and_then(|v| v.to_str().ok());
    assert_eq!(allow, Some("*"));

    handle.abort();
}

#[tokio::test]
async fn query_emits_structured_log() {
    let capture = EventCapture::new();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(capture.clone()));
    let _default = tracing::subscriber::set_default(subscriber);

    let app = app_router(AppState::new(pipeline(Arc::new(CountingGenerator))), MAX_UPLOAD);
    let request = Request::post("/query")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"query":"anything","top_k":2}"#))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.status().is_success());

    let events = capture.with_message("query answered");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fields["top_k"], serde_json::json!(2));
    assert_eq!(events[0].fields["sources"], serde_json::json!(0));
}
