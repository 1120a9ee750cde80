use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::info;

use racecarr_core::settings::Settings;

use crate::state::AppState;

use super::ApiError;

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.settings.load()?))
}

/// Persist new settings. The log level applies immediately; the tick interval
/// applies at the next tick boundary; quality parameters apply to the next
/// search.
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(new): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    if new.min_resolution > new.max_resolution {
        return Err(ApiError::BadRequest(
            "min_resolution exceeds max_resolution".to_string(),
        ));
    }
    if new.scheduler_tick_seconds < 10 {
        return Err(ApiError::BadRequest(
            "scheduler_tick_seconds must be at least 10".to_string(),
        ));
    }

    let previous = state.settings.load()?;
    state.settings.save(&new)?;

    if previous.log_level != new.log_level {
        state
            .log_handle
            .set_level(&new.log_level)
            .map_err(ApiError::BadRequest)?;
        info!(level = %new.log_level, "Log level updated");
    }

    Ok(Json(new))
}
