//! HTTP gateway over [`ContentService`].
//!
//! # Endpoints
//!
//! - `GET /health`
//! - `POST /api/upload` - multipart `file` plus optional `type`
//! - `POST /api/search` - `{"query": "...", "k": 5}`
//! - `GET /api/results` - most recently indexed documents
//! - `GET /api/files?limit=` and `GET /api/files/{id}` - ledger records
//! - `DELETE /api/delete?id=` - remove a file everywhere

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::config::{GatewayConfig, IndexConfig};
use crate::content::extract::{content_type_for_mime, guess_mime_type};
use crate::content::{ContentType, FileRecord, VectorMetadata};
use crate::error::ContentError;
use crate::retrieval::{Answer, ContentService, Upload};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: ContentService,
    pub list_limit: usize,
}

impl AppState {
    pub fn new(service: ContentService, index: &IndexConfig) -> Self {
        Self {
            service,
            list_limit: index.list_limit,
        }
    }
}

/// Error body: `{"error": ..., "details": ...}`.
#[derive(Debug)]
pub struct ApiError(ContentError);

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ContentError::NotFound { .. } => (StatusCode::NOT_FOUND, "File not found"),
            ContentError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            ContentError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Model provider failed"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = Json(json!({ "error": message, "details": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    documents_indexed: usize,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    id: String,
    #[serde(rename = "type")]
    kind: ContentType,
    filename: String,
    analysis: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    #[serde(flatten)]
    answer: Answer,
}

#[derive(Debug, Serialize)]
struct IndexedItem {
    id: String,
    document: String,
    metadata: VectorMetadata,
}

#[derive(Debug, Serialize)]
struct ResultsResponse {
    success: bool,
    items: Vec<IndexedItem>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct FileListResponse {
    success: bool,
    files: Vec<FileRecord>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
    message: &'static str,
}

/// Build the router with body-size and timeout limits applied.
pub fn router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/search", post(search))
        .route("/api/results", get(results))
        .route("/api/files", get(list_files))
        .route("/api/files/{id}", get(get_file))
        .route("/api/delete", delete(delete_file))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, config: &GatewayConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid gateway address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Gateway listening");

    axum::serve(listener, router(state, config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down gateway");
        })
        .await
        .context("Gateway server error")
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        documents_indexed: state.service.index().len(),
    })
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<UploadResponse> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ContentError::validation(format!("Malformed upload: {e}"))
    };

    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut declared: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_owned);
                let data = field.bytes().await.map_err(malformed)?;
                file = Some((filename, content_type, data.to_vec()));
            }
            Some("type") => {
                declared = Some(field.text().await.map_err(malformed)?);
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| ContentError::validation("No file provided"))?;
    let kind = match declared.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(declared) => declared.parse::<ContentType>()?,
        None => {
            let mime = content_type
                .as_deref()
                .unwrap_or_else(|| guess_mime_type(&filename));
            content_type_for_mime(mime)
                .ok_or_else(|| ContentError::validation("Invalid file type"))?
        }
    };

    let record = state
        .service
        .ingest(Upload {
            kind,
            filename,
            content_type,
            data,
        })
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        id: record.id,
        kind: record.kind,
        filename: record.filename,
        analysis: "File uploaded successfully. You can now search!",
    }))
}

async fn search(State(state): State<AppState>, Json(request): Json<SearchRequest>) -> ApiResult<SearchResponse> {
    let answer = state.service.ask(&request.query, request.k).await?;
    Ok(Json(SearchResponse {
        success: true,
        answer,
    }))
}

async fn results(State(state): State<AppState>) -> Json<ResultsResponse> {
    let items = state
        .service
        .recent_documents(Some(state.list_limit))
        .into_iter()
        .map(|record| IndexedItem {
            id: record.id,
            document: record.document,
            metadata: record.metadata,
        })
        .collect();
    Json(ResultsResponse {
        success: true,
        items,
    })
}

async fn list_files(State(state): State<AppState>, Query(params): Query<ListParams>) -> ApiResult<FileListResponse> {
    let limit = params.limit.filter(|n| *n > 0).unwrap_or(state.list_limit);
    let files = state.service.recent_files(Some(limit)).await?;
    Ok(Json(FileListResponse {
        success: true,
        files,
        limit,
    }))
}

async fn get_file(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<FileRecord> {
    match state.service.ledger().get_by_id(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ContentError::NotFound { id }.into()),
    }
}

async fn delete_file(State(state): State<AppState>, Query(params): Query<DeleteParams>) -> ApiResult<DeleteResponse> {
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ContentError::validation("No file ID provided"))?;

    if state.service.remove(&id).await? {
        Ok(Json(DeleteResponse {
            success: true,
            message: "File deleted successfully",
        }))
    } else {
        Err(ContentError::NotFound { id }.into())
    }
}
