use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use racecarr_core::history::HistoryEntry;

use crate::logging::{tail_log, LogEntry};
use crate::state::AppState;

use super::ApiError;

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state
        .db
        .ping()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(json!({ "status": "ready" })))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.scheduler.status();
    Json(json!({ "scheduler": status }))
}

pub async fn config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::to_value(state.sanitized_config()).unwrap_or_default())
}

pub async fn recent_logs(State(state): State<Arc<AppState>>) -> Json<Vec<LogEntry>> {
    Json(tail_log(&state.config.logging.dir, 50))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(state.history.list_recent(100)?))
}
