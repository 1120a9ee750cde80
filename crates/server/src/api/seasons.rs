use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use racecarr_core::catalog::{Round, Season};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    include_hidden: bool,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Season>>, ApiError> {
    Ok(Json(state.catalog.list_seasons(params.include_hidden)?))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Result<Json<Season>, ApiError> {
    let season = state
        .importer
        .refresh_season(state.provider.as_ref(), year)
        .await?;
    Ok(Json(season))
}

pub async fn hide(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Season>, ApiError> {
    Ok(Json(state.catalog.set_season_hidden(
        id,
        true,
        state.clock.now(),
    )?))
}

pub async fn restore(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Season>, ApiError> {
    Ok(Json(state.catalog.set_season_hidden(
        id,
        false,
        state.clock.now(),
    )?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.catalog.delete_season(id)? {
        return Err(ApiError::NotFound(format!("season {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn rounds(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Round>>, ApiError> {
    if state.catalog.get_season(id)?.is_none() {
        return Err(ApiError::NotFound(format!("season {id}")));
    }
    Ok(Json(state.catalog.list_rounds(id)?))
}
