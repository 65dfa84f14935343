//! HTTP API: ingestion trigger, file upload, query trigger, health check.
//!
//! Business failures ride in the response body with a 200; non-2xx codes are
//! reserved for malformed requests and transport-level failures.

use crate::config::Config;
use crate::error::DockError;
use crate::events::LoadReport;
use crate::fetch::SourceFetch;
use crate::llm::LanguageModel;
use crate::loader::Loader;
use crate::query::{AskRequest, AskResponse, QueryEngine};
use crate::warehouse::Warehouse;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const UPLOAD_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub warehouse: Arc<dyn Warehouse>,
    pub llm: Arc<dyn LanguageModel>,
    pub fetcher: Arc<dyn SourceFetch>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/load", post(handle_load))
        .route("/api/upload", post(handle_upload))
        .route("/api/ask", post(handle_ask))
        .route("/api/health", get(handle_health))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Request-level failure as a structured JSON body.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<DockError> for ApiError {
    fn from(e: DockError) -> Self {
        let status = match e {
            DockError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": { "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError { status: StatusCode::BAD_REQUEST, message: message.into() }
}

// ============ Ingestion ============

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub status: String,
    pub message: String,
    pub events: Vec<crate::events::LoadEvent>,
    pub tables_loaded: usize,
}

impl From<LoadReport> for LoadResponse {
    fn from(report: LoadReport) -> Self {
        Self {
            status: match report.status {
                crate::events::LoadStatus::Completed => "completed".to_string(),
                crate::events::LoadStatus::Failed => "failed".to_string(),
            },
            message: report.message,
            events: report.events,
            tables_loaded: report.tables_loaded,
        }
    }
}

async fn handle_load(
    State(state): State<AppState>,
    Json(request): Json<LoadRequest>,
) -> Json<LoadResponse> {
    info!("Load run requested with {} sources", request.sources.len());
    let loader = Loader::new(state.warehouse.as_ref(), state.fetcher.as_ref());
    let report = loader.run(&request.sources).await;
    Json(report.into())
}

// ============ Upload ============

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<LoadResponse>, ApiError> {
    let mut saved_path: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| bad_request("No filename provided"))?;
        // Uploads keep their original filename; strip any path components a
        // client might send.
        let file_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name.as_str())
            .to_string();
        if file_name.is_empty() {
            return Err(bad_request("Empty filename"));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file data: {}", e)))?;

        std::fs::create_dir_all(&state.config.upload_dir).map_err(DockError::from)?;
        let path = state.config.upload_dir.join(&file_name);
        std::fs::write(&path, &bytes).map_err(DockError::from)?;
        info!("Persisted upload {} ({} bytes)", path.display(), bytes.len());
        saved_path = Some(path.to_string_lossy().into_owned());
    }

    let path = saved_path.ok_or_else(|| bad_request("No file provided in upload"))?;
    let loader = Loader::new(state.warehouse.as_ref(), state.fetcher.as_ref());
    let report = loader.run(&[path]).await;
    Ok(Json(report.into()))
}

// ============ Query ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let engine = QueryEngine::new(
        state.warehouse.as_ref(),
        state.llm.as_ref(),
        state.config.max_result_rows,
    );
    let response = engine.ask(&request).await?;
    Ok(Json(response))
}

// ============ Health ============

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    warehouse: String,
    chart_engines: BTreeMap<String, bool>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let warehouse = match state.warehouse.connect().await {
        Ok(session) => {
            let ping = session.ping().await;
            let _ = session.close().await;
            ping
        }
        Err(e) => Err(e),
    };

    let (status, warehouse) = match warehouse {
        Ok(version) => ("ok".to_string(), version),
        Err(e) => ("degraded".to_string(), format!("unavailable: {}", e)),
    };

    let mut chart_engines = BTreeMap::new();
    chart_engines.insert("plotters".to_string(), true);

    Json(HealthResponse { status, warehouse, chart_engines })
}
