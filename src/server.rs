//! HTTP API over [`AudiobookService`] (feature `server`).
//!
//! | Method | Path                          | Purpose                      |
//! |--------|-------------------------------|------------------------------|
//! | GET    | `/health`                     | liveness + version           |
//! | POST   | `/v1/audiobooks`              | submit text, returns job id  |
//! | GET    | `/v1/audiobooks`              | list tracked jobs            |
//! | GET    | `/v1/audiobooks/{job_id}`     | poll status                  |
//! | POST   | `/v1/audiobooks/{job_id}/cancel` | request cancellation      |
//! | GET    | `/v1/audiobooks/{job_id}/audio`  | download the finished WAV |

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::AudiobookError,
    job::{JobId, JobStatus},
    service::AudiobookService,
    VERSION,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AudiobookService>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError(AudiobookError);

impl From<AudiobookError> for ApiError {
    fn from(e: AudiobookError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AudiobookError::EmptyText
            | AudiobookError::NoChunks
            | AudiobookError::InvalidSpeed(_) => StatusCode::BAD_REQUEST,
            AudiobookError::NotFound(_) => StatusCode::NOT_FOUND,
            AudiobookError::NotReady { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_chunks: usize,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": VERSION }))
}

async fn submit_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.service.config();
    let title = req.title.unwrap_or_else(|| "Untitled".to_string());
    let voice = req.voice.unwrap_or_else(|| config.default_voice.clone());
    let speed = req.speed.unwrap_or(config.default_speed);

    let job_id = state.service.submit(&req.text, &title, &voice, speed)?;
    let report = state.service.status(&job_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse { job_id, status: report.status, total_chunks: report.total_chunks }),
    ))
}

async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.jobs())
}

async fn status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.status(&JobId::from(job_id))?))
}

async fn cancel_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = JobId::from(job_id);
    // Unknown ids are a 404; known-but-finished ids report `false`.
    state.service.status(&id)?;
    let cancelled = state.service.cancel(&id);
    Ok(Json(serde_json::json!({ "job_id": id, "cancelled": cancelled })))
}

async fn audio_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = JobId::from(job_id);
    let path = state.service.audio_path(&id)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "cannot read finished audiobook");
        ApiError(AudiobookError::NotFound(id.clone()))
    })?;
    let disposition = format!("attachment; filename=\"audiobook-{}.wav\"", id);
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Router + background sweep
// ─────────────────────────────────────────────────────────────────────────────

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/audiobooks", post(submit_handler).get(list_handler))
        .route("/v1/audiobooks/{job_id}", get(status_handler))
        .route("/v1/audiobooks/{job_id}/cancel", post(cancel_handler))
        .route("/v1/audiobooks/{job_id}/audio", get(audio_handler))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

/// Periodically drop finished jobs past the configured retention.
pub fn spawn_sweeper(service: Arc<AudiobookService>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; nothing to sweep yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = service.sweep_expired();
            tracing::debug!(removed, remaining = service.registry().len(), "sweep finished");
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
