//! HTTP server.
//!
//! Exposes the cache lifecycle and both retrieval stages as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/cache/status` | Cache lifecycle flags and counters |
//! | `POST` | `/cache/refresh` | Start a background refresh |
//! | `POST` | `/search` | Stage 1: candidates with previews |
//! | `GET`  | `/documents/{id}?query=` | Stage 2: full content and related documents |
//! | `POST` | `/answer` | Stage 1, escalating to stage 2 per policy |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "conflict", "message": "a cache load is already in progress" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `not_configured` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::cache::{CacheError, CacheStatus, DocumentCache, LoadOutcome};
use crate::config::Config;
use crate::load::build_service;
use crate::retrieval::{Answer, CandidateSet, DocumentDetail, RetrievalService};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<RetrievalService>,
}

/// Build the service stack from `config`, load the cache in the background,
/// and serve on `[server].bind` until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = build_service(config)?;
    spawn_background_load(service.cache().clone());

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    serve(listener, service).await
}

/// Initial load followed by the periodic refresh loop. Requests are served
/// meanwhile, falling back to the remote source until the cache is ready.
///
/// The refresh loop starts even when the initial load fails, so a transient
/// outage heals on the next tick. The task resolves to the loop's handle,
/// or `None` when the source is not configured or refresh is disabled.
pub fn spawn_background_load(cache: Arc<DocumentCache>) -> JoinHandle<Option<JoinHandle<()>>> {
    tokio::spawn(async move {
        match cache.initialize().await {
            Ok(LoadOutcome::Completed { documents, .. }) => {
                info!(documents, "initial cache load complete");
            }
            Ok(outcome) => info!(?outcome, "initial cache load skipped"),
            Err(CacheError::NotConfigured) => {
                warn!("content source not configured; serving without a cache");
                return None;
            }
            Err(e) => warn!(error = %e, "initial cache load failed; retrying on schedule"),
        }
        cache.spawn_refresh_loop()
    })
}

/// Serve the API on an already-bound listener.
pub async fn serve(listener: TcpListener, service: Arc<RetrievalService>) -> anyhow::Result<()> {
    axum::serve(listener, router(service)).await?;
    Ok(())
}

pub fn router(service: Arc<RetrievalService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/cache/status", get(handle_cache_status))
        .route("/cache/refresh", post(handle_cache_refresh))
        .route("/search", post(handle_search))
        .route("/documents/{id}", get(handle_get_document))
        .route("/answer", post(handle_answer))
        .layer(cors)
        .with_state(AppState { service })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"conflict"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
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

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        let (status, code) = match err {
            CacheError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            CacheError::Conflict => (StatusCode::CONFLICT, "conflict"),
            CacheError::Load(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /cache ============

async fn handle_cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.service.cache().status())
}

#[derive(Serialize)]
struct RefreshResponse {
    status: String,
}

/// Claims the loading flag synchronously, so a concurrent request always
/// sees either `202` or `409`, never two loads.
async fn handle_cache_refresh(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RefreshResponse>), AppError> {
    state.service.cache().begin_refresh()?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            status: "started".to_string(),
        }),
    ))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Json<CandidateSet> {
    Json(state.service.find_candidates(&req.query).await)
}

// ============ GET /documents/{id} ============

#[derive(Deserialize)]
struct DetailParams {
    query: Option<String>,
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<DocumentDetail>, AppError> {
    let query = params.query.as_deref().filter(|q| !q.trim().is_empty());
    state
        .service
        .get_detail(&id, query)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("document not found: {}", id)))
}

// ============ POST /answer ============

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Answer>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(Json(state.service.answer(&req.query).await))
}
