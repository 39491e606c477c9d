use crate::errors::{ErrorCategory, SnapshotError};
use crate::mapping::Layout;
use crate::selector::DatePattern;
use crate::snapshot::WriteMode;
use crate::state::{AppState, RunRecord};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Trigger, status and health routes over one shared [`AppState`].
pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    Router::new()
        .route(&config.trigger_path, post(create_today))
        .route(&config.status_path, get(status))
        .route("/health", get(health))
        .with_state(state)
}

async fn create_today(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    tracing::info!("snapshot triggered over http");
    let report = state.trigger().await?;
    tracing::info!(sheet = %report.sheet_name, run_id = %report.run_id, "trigger succeeded");
    Ok(Redirect::to(&state.config().status_path))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    spreadsheet_id: String,
    store: &'static str,
    layout: Layout,
    date_pattern: DatePattern,
    write_mode: WriteMode,
    running: bool,
    last_run: Option<RunRecord>,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let config = state.config();
    let service = state.service();
    Json(StatusResponse {
        spreadsheet_id: config.spreadsheet_id.clone(),
        store: service.store_name(),
        layout: config.layout,
        date_pattern: config.date_pattern,
        write_mode: config.write_mode,
        running: service.is_running(),
        last_run: state.last_run(),
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// A failed trigger, rendered as `{"error", "category", "written"?}`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] SnapshotError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        let err = &self.0;
        if err.is_timeout() {
            return StatusCode::GATEWAY_TIMEOUT;
        }
        match err.category() {
            ErrorCategory::NoReferenceSheet => StatusCode::BAD_REQUEST,
            ErrorCategory::DuplicateSheet | ErrorCategory::Busy => StatusCode::CONFLICT,
            ErrorCategory::InvalidMapping => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCategory::CreateFailed | ErrorCategory::ReadFailed | ErrorCategory::WriteFailed => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    category: ErrorCategory,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    written: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "trigger failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.0, "trigger rejected");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            category: self.0.category(),
            written: self.0.written_ranges().to_vec(),
        };
        (status, Json(body)).into_response()
    }
}
