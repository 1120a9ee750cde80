//! CRUD and connection tests for indexers, downloaders and notification
//! targets.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use racecarr_core::downloader::DownloadClient;
use racecarr_core::notify::{Notification, NotificationKind};
use racecarr_core::redact::redact;
use racecarr_core::registry::{
    Downloader, Indexer, NewDownloader, NewIndexer, NewNotificationTarget, NotificationTarget,
};

use crate::state::AppState;

use super::ApiError;

// --- indexers ---

pub async fn list_indexers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Indexer>>, ApiError> {
    Ok(Json(state.registry.list_indexers(false)?))
}

pub async fn create_indexer(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewIndexer>,
) -> Result<Json<Indexer>, ApiError> {
    Ok(Json(state.registry.create_indexer(new)?))
}

pub async fn update_indexer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(new): Json<NewIndexer>,
) -> Result<Json<Indexer>, ApiError> {
    Ok(Json(state.registry.update_indexer(id, new)?))
}

pub async fn delete_indexer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.delete_indexer(id)? {
        return Err(ApiError::NotFound(format!("indexer {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn test_indexer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let indexer = state
        .registry
        .get_indexer(id)?
        .ok_or_else(|| ApiError::NotFound(format!("indexer {id}")))?;

    match state.newznab.test_connection(&indexer).await {
        Ok(()) => {
            state.registry.set_indexer_error(id, None)?;
            Ok(Json(json!({ "ok": true, "message": "Caps retrieved" })))
        }
        Err(e) => {
            let message = redact(&e.to_string());
            state.registry.set_indexer_error(id, Some(&message))?;
            Ok(Json(json!({ "ok": false, "message": message })))
        }
    }
}

// --- downloaders ---

pub async fn list_downloaders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Downloader>>, ApiError> {
    Ok(Json(state.registry.list_downloaders(false)?))
}

pub async fn create_downloader(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewDownloader>,
) -> Result<Json<Downloader>, ApiError> {
    Ok(Json(state.registry.create_downloader(new)?))
}

pub async fn update_downloader(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(new): Json<NewDownloader>,
) -> Result<Json<Downloader>, ApiError> {
    Ok(Json(state.registry.update_downloader(id, new)?))
}

pub async fn delete_downloader(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.delete_downloader(id)? {
        return Err(ApiError::NotFound(format!("downloader {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn test_downloader(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let downloader = state
        .registry
        .get_downloader(id)?
        .ok_or_else(|| ApiError::NotFound(format!("downloader {id}")))?;

    match state.downloader.test(&downloader).await {
        Ok(()) => {
            state.registry.set_downloader_error(id, None)?;
            Ok(Json(json!({ "ok": true, "message": "Connection OK" })))
        }
        Err(e) => {
            let message = redact(&e.to_string());
            state.registry.set_downloader_error(id, Some(&message))?;
            Ok(Json(json!({ "ok": false, "message": message })))
        }
    }
}

// --- notification targets ---

pub async fn list_targets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NotificationTarget>>, ApiError> {
    Ok(Json(state.registry.list_targets()?))
}

pub async fn create_target(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewNotificationTarget>,
) -> Result<Json<NotificationTarget>, ApiError> {
    Ok(Json(state.registry.create_target(new)?))
}

pub async fn update_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(new): Json<NewNotificationTarget>,
) -> Result<Json<NotificationTarget>, ApiError> {
    Ok(Json(state.registry.update_target(id, new)?))
}

pub async fn delete_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.delete_target(id)? {
        return Err(ApiError::NotFound(format!("notification target {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

/// Test delivery to every configured target, masks ignored.
pub async fn test_targets(State(state): State<Arc<AppState>>) -> Json<Value> {
    let outcomes = state
        .dispatcher
        .dispatch_and_wait(&Notification {
            kind: NotificationKind::Test,
            title: "Racecarr".to_string(),
            body: "Test notification".to_string(),
            payload: json!({}),
        })
        .await;

    let results: Vec<Value> = outcomes
        .into_iter()
        .map(|(name, result)| match result {
            Ok(()) => json!({ "target": name, "ok": true }),
            Err(e) => json!({ "target": name, "ok": false, "error": redact(&e.to_string()) }),
        })
        .collect();
    Json(json!({ "results": results }))
}
