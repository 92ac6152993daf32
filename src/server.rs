//! HTTP front end: the "transcribe a PDF" operation over axum.
//!
//! | Method | Path              | Body                          | Success |
//! |--------|-------------------|-------------------------------|---------|
//! | POST   | `/transcribe/pdf` | multipart form, field `file`  | `{"markdown_content": "..."}` |
//! | GET    | `/health`         | —                             | `{"status": "ok", "version": "..."}` |
//!
//! Failures are JSON `{"error", "message"}` bodies: validation failures are
//! `400 invalid_input`, everything else is `500 processing_error` carrying
//! the cause. Errors are logged once, here, at the request boundary.

use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::output::TranscriptionResponse;
use crate::transcribe::Transcriber;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Process-level settings for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address to bind. `PDF_TRANSCRIBE_ADDR`, default `0.0.0.0:8000`.
    pub addr: String,
    /// Tokio worker threads. `PDF_TRANSCRIBE_WORKERS`, default: one per core.
    pub workers: Option<usize>,
    /// Largest accepted request body. `PDF_TRANSCRIBE_MAX_UPLOAD_MB`, default 50.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            workers: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, TranscribeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TranscribeError> {
        let defaults = Self::default();
        Ok(Self {
            addr: lookup("PDF_TRANSCRIBE_ADDR")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.addr),
            workers: parse_var(&lookup, "PDF_TRANSCRIBE_WORKERS")?.filter(|n| *n > 0),
            max_upload_bytes: parse_var::<usize>(&lookup, "PDF_TRANSCRIBE_MAX_UPLOAD_MB")?
                .map(|mb| mb.saturating_mul(1024 * 1024))
                .unwrap_or(defaults.max_upload_bytes),
        })
    }
}

/// Pipeline settings for the service, from `PDF_TRANSCRIBE_*` variables.
pub fn transcription_config_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<TranscriptionConfig, TranscribeError> {
    let mut builder = TranscriptionConfig::builder();
    if let Some(provider) = lookup("PDF_TRANSCRIBE_PROVIDER").filter(|v| !v.is_empty()) {
        builder = builder.provider_name(provider);
    }
    if let Some(model) = lookup("PDF_TRANSCRIBE_MODEL").filter(|v| !v.is_empty()) {
        builder = builder.model(model);
    }
    if let Some(n) = parse_var(&lookup, "PDF_TRANSCRIBE_CONCURRENCY")? {
        builder = builder.concurrency(n);
    }
    if let Some(n) = parse_var(&lookup, "PDF_TRANSCRIBE_MAX_RETRIES")? {
        builder = builder.max_retries(n);
    }
    if let Some(dpi) = parse_var(&lookup, "PDF_TRANSCRIBE_DPI")? {
        builder = builder.dpi(dpi);
    }
    builder.build()
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, TranscribeError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TranscribeError::InvalidConfig(format!("{key}={raw:?} is not a valid value"))),
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub transcriber: Arc<Transcriber>,
}

impl AppState {
    pub fn new(transcriber: Transcriber) -> Self {
        Self {
            transcriber: Arc::new(transcriber),
        }
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/transcribe/pdf", post(transcribe_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `config.addr` and serve until the process is stopped.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<(), std::io::Error> {
    let app = build_router(state, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn transcribe_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        info!("Upload '{}' ({} bytes)", file_name, bytes.len());

        let output = state
            .transcriber
            .transcribe(&file_name, bytes.to_vec())
            .await?;
        return Ok(Json(output.into()));
    }
    Err(ApiError::InvalidInput("no `file` field in upload".to_string()))
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Error returned to HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    /// The upload is not something we can transcribe.
    InvalidInput(String),
    /// The multipart body could not be read.
    Upload(MultipartError),
    /// Transcription failed after the input was accepted.
    Processing(TranscribeError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Upload(e)
    }
}

impl From<TranscribeError> for ApiError {
    fn from(e: TranscribeError) -> Self {
        if e.is_client_error() {
            ApiError::InvalidInput(e.to_string())
        } else {
            ApiError::Processing(e)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::InvalidInput(detail) => {
                warn!("Rejected upload: {}", detail);
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_input",
                    "Invalid PDF file".to_string(),
                )
            }
            ApiError::Upload(e) => {
                warn!("Unreadable upload: {}", e);
                (e.status(), "invalid_input", e.body_text())
            }
            ApiError::Processing(e) => {
                error!("Processing error ({:?}): {}", e.kind(), e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "processing_error",
                    format!("Processing error: {}", e),
                )
            }
        };
        (status, Json(ErrorResponse { error, message })).into_response()
    }
}
