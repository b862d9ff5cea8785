//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/ingest/files` | Multipart upload (`files`), ingested in the background |
//! | `POST` | `/api/ingest/urls` | Fetch pages by URL, ingested in the background |
//! | `POST` | `/api/chat` | Retrieval-grounded answer with cited sources |
//! | `GET`  | `/api/sources` | Per-source chunk counts |
//! | `GET`  | `/api/mirror/status` | Mirror configuration state |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_media_type` (415),
//! `embedding_error` (502), `generation_error` (502), `index_unavailable`
//! (503), `index_error` (500), `internal` (500).
//!
//! # Background ingestion
//!
//! The ingest endpoints extract text synchronously, so that unreadable
//! uploads and unreachable URLs are rejected in the response, then reply
//! with the number of accepted documents and run chunk/embed/store on a
//! spawned task. Failures of that task are logged, not reported to the
//! caller.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use knowledge_copilot_core::models::{ChunkMetadata, SourceDocument, SourceType};
use knowledge_copilot_core::CoreError;

use crate::copilot::{ChatAnswer, ChatError, ChatRequest, Copilot};
use crate::extract::{extract_upload, fetch_url_text, ExtractError};
use crate::mirror::MirrorStatus;

/// Upload size ceiling for `/api/ingest/files`.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    copilot: Arc<Copilot>,
}

/// Build the router with CORS from `[server].allowed_origins`.
pub fn build_router(copilot: Arc<Copilot>) -> anyhow::Result<Router> {
    let cors = cors_layer(&copilot.config().server.allowed_origins)?;
    let state = AppState { copilot };

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/api/ingest/files", post(handle_ingest_files))
        .route("/api/ingest/urls", post(handle_ingest_urls))
        .route("/api/chat", post(handle_chat))
        .route("/api/sources", get(handle_sources))
        .route("/api/mirror/status", get(handle_mirror_status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(copilot: Arc<Copilot>) -> anyhow::Result<()> {
    let bind_addr = copilot.config().server.bind.clone();
    let app = build_router(copilot)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "HTTP server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidConfiguration(_) => bad_request(message),
            CoreError::EmbeddingProvider(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "embedding_error", message)
            }
            CoreError::IndexUnavailable { .. } => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "index_unavailable", message)
            }
            CoreError::IndexOperation { .. } => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "index_error", message)
            }
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => bad_request(err.to_string()),
            ChatError::Core(core) => core.into(),
            ChatError::Generation(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_error", err.to_string())
            }
            ChatError::Mirror(_) => internal(err.to_string()),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFileType(_) => AppError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                err.to_string(),
            ),
            ExtractError::Io(..) => internal(err.to_string()),
            _ => bad_request(err.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Ingestion ============

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Number of files or URLs accepted, not segments.
    pub inserted: usize,
    pub source_type: SourceType,
}

#[derive(Debug, Deserialize)]
struct IngestUrlsRequest {
    urls: Vec<String>,
    /// Accepted for client compatibility; not stored.
    #[serde(default)]
    #[allow(dead_code)]
    tags: Option<Vec<String>>,
}

/// Chunk, embed and store `documents` on a background task.
fn spawn_ingest(copilot: Arc<Copilot>, documents: Vec<SourceDocument>, source_type: SourceType) {
    tokio::spawn(async move {
        match copilot.ingest(&documents).await {
            Ok(segments) => info!(
                %source_type,
                documents = documents.len(),
                segments,
                "background ingestion finished"
            ),
            Err(e) => error!(%source_type, error = %e, "background ingestion failed"),
        }
    });
}

async fn handle_ingest_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("uploaded").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read {}: {}", file_name, e)))?;

        let name = file_name.clone();
        let (text, content_type) =
            tokio::task::spawn_blocking(move || extract_upload(&name, &bytes))
                .await
                .map_err(|e| internal(e.to_string()))??;

        documents.push(SourceDocument::new(
            text,
            ChunkMetadata::file(file_name, content_type),
        ));
    }

    if documents.is_empty() {
        return Err(bad_request("no files uploaded under field 'files'"));
    }

    let inserted = documents.len();
    spawn_ingest(state.copilot.clone(), documents, SourceType::File);
    Ok(Json(IngestResponse {
        inserted,
        source_type: SourceType::File,
    }))
}

async fn handle_ingest_urls(
    State(state): State<AppState>,
    Json(payload): Json<IngestUrlsRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let mut documents = Vec::with_capacity(payload.urls.len());
    for url in &payload.urls {
        let text = fetch_url_text(state.copilot.http(), url).await?;
        documents.push(SourceDocument::new(text, ChunkMetadata::url(url, "html")));
    }

    let inserted = documents.len();
    if inserted > 0 {
        spawn_ingest(state.copilot.clone(), documents, SourceType::Url);
    }
    Ok(Json(IngestResponse {
        inserted,
        source_type: SourceType::Url,
    }))
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, AppError> {
    Ok(Json(state.copilot.answer(&request).await?))
}

// ============ GET /api/sources ============

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceListItem {
    pub name: String,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
}

async fn handle_sources(
    State(state): State<AppState>,
) -> Result<Json<Vec<SourceListItem>>, AppError> {
    let summaries = state.copilot.sources().await?;
    Ok(Json(
        summaries
            .into_iter()
            .map(|s| SourceListItem {
                name: format!("{} ({} chunks)", s.name, s.chunk_count),
                source_type: s.source_type,
                created_at: s.created_at,
            })
            .collect(),
    ))
}

// ============ GET /api/mirror/status ============

async fn handle_mirror_status(
    State(state): State<AppState>,
) -> Result<Json<MirrorStatus>, AppError> {
    state
        .copilot
        .mirror_status()
        .map(Json)
        .map_err(|e| internal(e.to_string()))
}
