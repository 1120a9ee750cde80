use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::{endpoints, rounds, seasons, settings, system, watches};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(system::healthz))
        .route("/readyz", get(system::readyz))
        .route("/logs", get(system::recent_logs))
        .route("/api/status", get(system::status))
        .route("/api/config", get(system::config))
        // seasons
        .route("/api/seasons", get(seasons::list))
        .route("/api/seasons/:year/refresh", post(seasons::refresh))
        .route("/api/seasons/:id/hide", post(seasons::hide))
        .route("/api/seasons/:id/restore", post(seasons::restore))
        .route("/api/seasons/:id", delete(seasons::remove))
        .route("/api/seasons/:id/rounds", get(seasons::rounds))
        // rounds
        .route("/api/rounds/:id/events", get(rounds::events))
        .route("/api/rounds/:id/search", post(rounds::search))
        .route("/api/rounds/:id/auto-grab", post(rounds::auto_grab))
        // watch entries
        .route("/api/searches", get(watches::list).post(watches::create))
        .route(
            "/api/searches/:id",
            patch(watches::update).delete(watches::remove),
        )
        .route("/api/searches/:id/run-now", post(watches::run_now))
        // history
        .route("/api/history", get(system::history))
        // indexers
        .route(
            "/api/indexers",
            get(endpoints::list_indexers).post(endpoints::create_indexer),
        )
        .route(
            "/api/indexers/:id",
            put(endpoints::update_indexer).delete(endpoints::delete_indexer),
        )
        .route("/api/indexers/:id/test", post(endpoints::test_indexer))
        // downloaders
        .route(
            "/api/downloaders",
            get(endpoints::list_downloaders).post(endpoints::create_downloader),
        )
        .route(
            "/api/downloaders/:id",
            put(endpoints::update_downloader).delete(endpoints::delete_downloader),
        )
        .route(
            "/api/downloaders/:id/test",
            post(endpoints::test_downloader),
        )
        // notification targets
        .route(
            "/api/notifications",
            get(endpoints::list_targets).post(endpoints::create_target),
        )
        .route(
            "/api/notifications/:id",
            put(endpoints::update_target).delete(endpoints::delete_target),
        )
        .route("/api/notifications/test", post(endpoints::test_targets))
        // settings
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::put_settings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
