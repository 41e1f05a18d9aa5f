//! HTTP surface for the study mentor backend.
//!
//! This module exposes an Axum router with the endpoints the frontend uses:
//!
//! - `GET /` – Liveness probe returning `{"status": "backend running"}`.
//! - `POST /upload` – Multipart upload; extracts, chunks, embeds, and stores the document.
//! - `POST /api/process-file` – Download a remote file by URL and run the same pipeline.
//! - `POST /api/ask` – Answer a question, grounded on one file's chunks when `file_id` is given.
//! - `POST /api/chat` – General chat turn; both sides are persisted to the chat log.
//! - `GET /chats/{user_id}` – Chat log ordered by timestamp.
//! - `GET /api/files/{user_id}` – File records owned by a user.
//! - `GET /metrics` – Activity counters for observability.
//!
//! Every failure maps to a JSON body of the shape
//! `{"status": "error", "message": ...}` through a single error-to-response
//! conversion; external-service failures surface as HTTP 500 and malformed
//! requests as HTTP 400.

use crate::metadata::{ChatRole, MetadataError};
use crate::metrics::MetricsSnapshot;
use crate::processing::{AskError, BackendApi, IngestRequest, ProcessingError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Upper bound on uploaded document size.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the HTTP router exposing the backend API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: BackendApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/upload", post(upload_file::<S>))
        .route("/api/process-file", post(process_file::<S>))
        .route("/api/ask", post(ask::<S>))
        .route("/api/chat", post(chat::<S>))
        .route("/chats/:user_id", get(list_chats::<S>))
        .route("/api/files/:user_id", get(list_files::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "backend running" }))
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    #[serde(rename = "fileId")]
    file_id: String,
}

/// Accept a multipart document and run it through the ingestion pipeline.
async fn upload_file<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: BackendApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "untitled".to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(err.to_string()))?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| AppError::bad_request("multipart upload is missing a 'file' part"))?;

    let outcome = service
        .ingest_document(IngestRequest {
            bytes,
            filename,
            user_id: None,
            source_url: None,
            file_id: None,
        })
        .await?;
    tracing::info!(file_id = %outcome.file_id, chunks = outcome.chunk_count, "Upload processed");

    Ok(Json(UploadResponse {
        status: "success",
        file_id: outcome.file_id,
    }))
}

/// Request body for the `POST /api/process-file` endpoint.
#[derive(Deserialize)]
struct ProcessFileRequest {
    /// Public URL of the file to download and process.
    url: String,
    /// Filename recorded with the document metadata.
    filename: String,
    /// Owner of the document.
    user_id: String,
}

/// Success response for the `POST /api/process-file` endpoint.
#[derive(Serialize)]
struct ProcessFileResponse {
    message: &'static str,
    file_id: String,
}

/// Download a remote file and run it through the ingestion pipeline.
async fn process_file<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ProcessFileRequest>,
) -> Result<Json<ProcessFileResponse>, AppError>
where
    S: BackendApi,
{
    let outcome = service
        .process_remote_file(&request.url, &request.filename, &request.user_id)
        .await?;
    tracing::info!(
        file_id = %outcome.file_id,
        chunks = outcome.chunk_count,
        skipped_embeddings = outcome.skipped_embeddings,
        "Remote file processed"
    );

    Ok(Json(ProcessFileResponse {
        message: "File processed successfully",
        file_id: outcome.file_id,
    }))
}

/// Request body for the `POST /api/ask` endpoint.
#[derive(Deserialize)]
struct AskRequest {
    /// Question to answer.
    question: String,
    /// Caller identity; carried for parity with the chat log, unused here.
    #[serde(default)]
    #[allow(dead_code)]
    user_id: Option<String>,
    /// Optional file to ground the answer on; absent means general chat mode.
    #[serde(default)]
    file_id: Option<String>,
}

/// Response body for the `POST /api/ask` endpoint.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<String>,
}

/// Answer a question, optionally grounded on one file's chunks.
async fn ask<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError>
where
    S: BackendApi,
{
    if request.question.trim().is_empty() {
        return Err(AppError::bad_request("question must not be empty"));
    }

    let outcome = service
        .ask(&request.question, request.file_id.as_deref())
        .await?;
    Ok(Json(AskResponse {
        answer: outcome.answer,
        sources: outcome.sources,
    }))
}

/// Request body for the `POST /api/chat` endpoint.
#[derive(Deserialize)]
struct ChatRequest {
    /// Owner of the chat log.
    user_id: String,
    /// Message to send to the model.
    message: String,
}

/// Response body for the `POST /api/chat` endpoint.
#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}

/// Run a general chat turn and persist both sides of it.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: BackendApi,
{
    if request.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }

    let reply = service.chat(&request.user_id, &request.message).await?;
    Ok(Json(ChatResponse { reply }))
}

/// One chat log entry as returned by `GET /chats/{user_id}`.
#[derive(Serialize)]
struct ChatMessageView {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    role: ChatRole,
    text: String,
    timestamp: String,
}

/// Return a user's chat log ordered by timestamp.
async fn list_chats<S>(
    State(service): State<Arc<S>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessageView>>, AppError>
where
    S: BackendApi,
{
    let messages = service.list_chats(&user_id).await?;
    let views = messages
        .into_iter()
        .map(|message| ChatMessageView {
            id: message.id,
            role: message.role,
            text: message.text,
            timestamp: message.timestamp,
        })
        .collect();
    Ok(Json(views))
}

/// One file record as returned by `GET /api/files/{user_id}`.
#[derive(Serialize)]
struct FileView {
    file_id: String,
    filename: String,
    chunks: usize,
    url: String,
}

/// Return the file records owned by a user.
async fn list_files<S>(
    State(service): State<Arc<S>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<FileView>>, AppError>
where
    S: BackendApi,
{
    let files = service.list_files(&user_id).await?;
    let views = files
        .into_iter()
        .map(|file| FileView {
            file_id: file.file_id,
            filename: file.filename,
            chunks: file.chunk_count,
            url: file.source_url.unwrap_or_default(),
        })
        .collect();
    Ok(Json(views))
}

/// Return a concise activity snapshot with document/chunk/question counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: BackendApi,
{
    Json(service.metrics_snapshot())
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(status = %self.status, message = %self.message, "Request failed");
        (
            self.status,
            Json(json!({ "status": "error", "message": self.message })),
        )
            .into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: inner.to_string(),
        }
    }
}

impl From<AskError> for AppError {
    fn from(inner: AskError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: inner.to_string(),
        }
    }
}

impl From<MetadataError> for AppError {
    fn from(inner: MetadataError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: inner.to_string(),
        }
    }
}
