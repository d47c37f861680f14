use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::alerts::{AlertChecker, CheckDefinition, CheckStatus};
use crate::dispatch::DispatcherStats;

/// Application state shared across handlers
pub struct AppState {
    pub checker: Arc<AlertChecker>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.checker.dispatcher().is_stopped() {
        "stopping"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        checks: state.checker.len(),
    })
}

// ============================================================================
// Checks
// ============================================================================

#[derive(Serialize)]
pub struct ListChecksResponse {
    pub checks: Vec<CheckStatus>,
}

pub async fn list_checks(State(state): State<Arc<AppState>>) -> Json<ListChecksResponse> {
    Json(ListChecksResponse {
        checks: state.checker.list(),
    })
}

pub async fn get_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckStatus>, ApiError> {
    state
        .checker
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Check '{}' not found", id)))
}

pub async fn get_check_definition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckDefinition>, ApiError> {
    state
        .checker
        .definition(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Check '{}' not found", id)))
}

// ============================================================================
// Stats
// ============================================================================

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<DispatcherStats> {
    Json(state.checker.dispatcher().stats())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
