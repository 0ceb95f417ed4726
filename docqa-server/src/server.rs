use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docqa_rag::{RagError, RagPipeline, RawDocument};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::protocol::{ErrorBody, HealthResponse, QueryRequest, QueryResponse, UploadResponse};

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Name recorded for a file part sent without a filename. It has no
/// extension, so the format is sniffed from the bytes.
pub const UNNAMED_UPLOAD: &str = "upload";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000, max_upload_bytes: 50 * 1024 * 1024 }
    }
}

/// Error returned by every handler, rendered as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rag(#[from] RagError),
    #[error("invalid multipart upload: {0}")]
    Multipart(String),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart(err.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Rag(err) => match err {
                RagError::DecodeError(_)
                | RagError::EmptyContent(_)
                | RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                RagError::DocumentBusy(_) => StatusCode::CONFLICT,
                RagError::RetrievalError { .. } | RagError::GenerationError { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                RagError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                RagError::StoreWriteError { .. }
                | RagError::EmbeddingError { .. }
                | RagError::ConfigError(_)
                | RagError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

pub fn app_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, pipeline: Arc<RagPipeline>) -> anyhow::Result<()> {
    let app = app_router(AppState::new(pipeline), config.max_upload_bytes);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid host/port {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("docqa-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// POST /upload
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or(UNNAMED_UPLOAD).to_string();
        let bytes = field.bytes().await?;
        let receipt = state.pipeline.upload(RawDocument::new(name, bytes.to_vec())).await?;
        return Ok(Json(UploadResponse::from(receipt)));
    }
    Err(ApiError::Multipart(format!("missing '{FILE_FIELD}' field")))
}

/// POST /query
async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let answer = state.pipeline.query(&request.query, request.top_k).await?;
    Ok(Json(QueryResponse { answer: answer.text, query_time: answer.elapsed.as_secs_f64() }))
}
