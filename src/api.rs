//! HTTP surface for the document search service.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload` – Multipart upload (`files` fields). Every file is validated before any is
//!   stored; returns `{"uploaded_files": [{"file_id", "signed_url"}]}`.
//! - `POST /ocr?file_id=` – Extract text from a stored document, chunk and embed it, and upsert
//!   the vectors into Qdrant.
//! - `POST /extract?file_id=&query=` – Answer a question over an indexed document.
//! - `GET /health` – Constant liveness check.
//! - `GET /metrics` – Upload, indexing, and query counters.
//!
//! Errors are returned as `{"detail": message}` with a status derived from [`ServiceError`].

use crate::metrics::MetricsSnapshot;
use crate::processing::{DocumentApi, ServiceError, UploadReceipt, UploadedFile};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Multipart field carrying uploaded files.
const FILES_FIELD: &str = "files";

/// Build the HTTP router exposing the document API surface.
///
/// `body_limit` caps request bodies; keep it above the per-file limit so oversized files are
/// reported by the validator.
pub fn create_router<S>(service: Arc<S>, body_limit: usize) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/upload", post(upload_files::<S>))
        .route("/ocr", post(run_ocr::<S>))
        .route("/extract", post(extract_answer::<S>))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    uploaded_files: Vec<UploadReceipt>,
}

/// Store the uploaded files after validating the whole batch.
async fn upload_files<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: DocumentApi,
{
    let mut multipart = multipart.map_err(|rejection| {
        AppError(ServiceError::InvalidInput(rejection.body_text()))
    })?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        files.push(UploadedFile {
            filename,
            content_type,
            data,
        });
    }

    tracing::debug!(files = files.len(), "Upload request received");
    let uploaded_files = service.upload(files).await?;
    tracing::info!(files = uploaded_files.len(), "Upload request completed");
    Ok(Json(UploadResponse { uploaded_files }))
}

/// Query string for `POST /ocr`.
#[derive(Deserialize)]
struct OcrParams {
    #[serde(default)]
    file_id: String,
}

/// Success response for `POST /ocr`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

/// Run OCR on a stored document and index the resulting chunks.
async fn run_ocr<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<OcrParams>,
) -> Result<Json<StatusResponse>, AppError>
where
    S: DocumentApi,
{
    let outcome = service.ocr(&params.file_id).await?;
    tracing::info!(
        file_id = %params.file_id,
        index = %outcome.index_name,
        chunks = outcome.chunk_count,
        "OCR request completed"
    );
    Ok(Json(StatusResponse {
        status: "success",
        message: Some("OCR processing and embedding upload completed."),
    }))
}

/// Query string for `POST /extract`.
#[derive(Deserialize)]
struct ExtractParams {
    #[serde(default)]
    file_id: String,
    #[serde(default)]
    query: String,
}

/// Success response for `POST /extract`.
#[derive(Serialize)]
struct ExtractResponse {
    response: String,
}

/// Answer a question against an indexed document.
async fn extract_answer<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<ExtractParams>,
) -> Result<Json<ExtractResponse>, AppError>
where
    S: DocumentApi,
{
    let response = service.extract(&params.file_id, &params.query).await?;
    Ok(Json(ExtractResponse { response }))
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "success",
        message: None,
    })
}

/// Return upload, indexing, and query counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(ServiceError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0 {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Dependency(_) | ServiceError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        Self(ServiceError::InvalidInput(error.body_text()))
    }
}
