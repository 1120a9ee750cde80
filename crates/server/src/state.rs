use std::sync::Arc;

use racecarr_core::{
    calendar::{F1ApiClient, SeasonImporter},
    catalog::SqliteCatalog,
    clock::Clock,
    db::Db,
    downloader::DownloadClient,
    history::HistoryStore,
    notify::NotificationDispatcher,
    registry::SqliteRegistry,
    scheduler::Scheduler,
    searcher::NewznabClient,
    settings::SettingsStore,
    watch::WatchStore,
    Config, SanitizedConfig,
};

use crate::logging::LogHandle;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub catalog: Arc<SqliteCatalog>,
    pub registry: Arc<SqliteRegistry>,
    pub settings: Arc<SettingsStore>,
    pub watches: Arc<WatchStore>,
    pub history: Arc<HistoryStore>,
    pub scheduler: Arc<Scheduler>,
    pub importer: Arc<SeasonImporter>,
    pub provider: Arc<F1ApiClient>,
    pub newznab: Arc<NewznabClient>,
    pub downloader: Arc<dyn DownloadClient>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub log_handle: Arc<LogHandle>,
}

impl AppState {
    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }
}
