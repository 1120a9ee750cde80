use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use racecarr_core::scheduler::cadence;
use racecarr_core::watch::{NewWatchEntry, WatchEntry};

use crate::state::AppState;

use super::ApiError;

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WatchEntry>>, ApiError> {
    Ok(Json(state.watches.list()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewWatchEntry>,
) -> Result<Json<WatchEntry>, ApiError> {
    if state.catalog.get_round(new.round_id)?.is_none() {
        return Err(ApiError::NotFound(format!("round {}", new.round_id)));
    }
    if let Some(downloader_id) = new.downloader_id {
        if state.registry.get_downloader(downloader_id)?.is_none() {
            return Err(ApiError::NotFound(format!("downloader {downloader_id}")));
        }
    }

    let now = state.clock.now();
    let settings = state.settings.load()?;
    let start = state
        .catalog
        .get_event(new.round_id, new.event_type)?
        .and_then(|e| e.start_time_utc);
    let next_run = cadence::plan(start, now, &settings)
        .next_run()
        .map(|at| cadence::apply_jitter(at, settings.jitter_seconds))
        .unwrap_or(now);

    Ok(Json(state.watches.create(&new, Some(next_run), now)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    downloader_id: Option<Option<i64>>,
    /// "paused" or "scheduled".
    #[serde(default)]
    status: Option<String>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<WatchEntry>, ApiError> {
    if state.watches.get(id)?.is_none() {
        return Err(ApiError::NotFound(format!("watch entry {id}")));
    }

    if let Some(downloader_id) = body.downloader_id {
        state.watches.set_downloader(id, downloader_id)?;
    }

    match body.status.as_deref() {
        Some("paused") => {
            state.watches.pause(id)?;
        }
        Some("scheduled") => {
            state.watches.resume(id, state.clock.now())?;
        }
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "status must be paused or scheduled, got {other}"
            )));
        }
        None => {}
    }

    state
        .watches
        .get(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("watch entry {id}")))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.watches.delete(id)? {
        return Err(ApiError::NotFound(format!("watch entry {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn run_now(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<WatchEntry>, ApiError> {
    Ok(Json(state.scheduler.run_now(id).await?))
}
