use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use racecarr_core::catalog::{Event, EventType};
use racecarr_core::scheduler::{RoundGrabResult, RoundSearchResponse};

use crate::state::AppState;

use super::ApiError;

pub async fn events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Event>>, ApiError> {
    if state.catalog.get_round(id)?.is_none() {
        return Err(ApiError::NotFound(format!("round {id}")));
    }
    Ok(Json(state.catalog.list_events(id)?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    force: bool,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<SearchParams>,
) -> Result<Json<RoundSearchResponse>, ApiError> {
    Ok(Json(state.scheduler.search_round(id, params.force).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct AutoGrabBody {
    #[serde(default)]
    event_types: Option<Vec<String>>,
}

pub async fn auto_grab(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<AutoGrabBody>>,
) -> Result<Json<Vec<RoundGrabResult>>, ApiError> {
    let filter = body
        .map(|Json(b)| b.event_types)
        .unwrap_or_default()
        .map(|names| {
            names
                .iter()
                .map(|name| {
                    EventType::parse(name)
                        .ok_or_else(|| ApiError::BadRequest(format!("unknown event type {name}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(Json(state.scheduler.auto_grab_round(id, filter).await?))
}
