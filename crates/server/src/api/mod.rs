//! Operator API surface.

mod endpoints;
mod rounds;
mod routes;
mod seasons;
mod settings;
mod system;
mod watches;

pub use routes::create_router;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use racecarr_core::{calendar::CalendarError, redact::redact, SchedulerError, StoreError};

/// API error with a clean HTTP mapping. Messages are already redacted by the
/// core before they reach an error value.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(what),
            StoreError::Database(m) => ApiError::Internal(m),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::NotFound(what) => ApiError::NotFound(what),
            SchedulerError::StateConflict(what) => ApiError::Conflict(what),
            SchedulerError::Configuration(what) => ApiError::BadRequest(what),
            SchedulerError::Search(inner) => ApiError::Upstream(redact(&inner.to_string())),
            SchedulerError::Download(inner) => ApiError::Upstream(redact(&inner.to_string())),
            SchedulerError::Store(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<CalendarError> for ApiError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::Store(inner) => ApiError::from(inner),
            other => ApiError::Upstream(redact(&other.to_string())),
        }
    }
}
