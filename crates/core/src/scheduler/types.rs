//! Scheduler-facing types and errors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::EventType;
use crate::searcher::ReleaseCandidate;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(crate::db::StoreError),

    #[error(transparent)]
    Search(#[from] crate::searcher::SearchError),

    #[error(transparent)]
    Download(#[from] crate::downloader::DownloadError),
}

impl From<crate::db::StoreError> for SchedulerError {
    fn from(e: crate::db::StoreError) -> Self {
        match e {
            crate::db::StoreError::NotFound(what) => SchedulerError::NotFound(what),
            crate::db::StoreError::Conflict(what) => SchedulerError::StateConflict(what),
            other => SchedulerError::Store(other),
        }
    }
}

/// Response for an operator round search.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSearchResponse {
    pub results: Vec<ReleaseCandidate>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    pub ttl_hours: i64,
}

/// Per-event outcome of a round-level auto-grab.
#[derive(Debug, Clone, Serialize)]
pub struct RoundGrabResult {
    pub event_type: EventType,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Live scheduler counters for the operator surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub scheduled: usize,
    pub waiting_download: usize,
    pub failed: usize,
}
