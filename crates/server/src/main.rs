mod api;
mod logging;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use racecarr_core::{
    cache::SearchCache,
    calendar::{F1ApiClient, SeasonImporter},
    catalog::SqliteCatalog,
    clock::{Clock, SystemClock},
    db::Db,
    downloader::{DownloadClient, DownloaderHub},
    history::HistoryStore,
    notify::{NotificationDispatcher, Notifier},
    registry::SqliteRegistry,
    scheduler::Scheduler,
    searcher::{EventSearcher, NewznabClient, ReleaseSearcher, SearchLimits},
    settings::SettingsStore,
    watch::WatchStore,
    load_config,
};

use api::create_router;
use state::AppState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("RACECARR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("racecarr.toml"));
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {config_path:?}"))?;

    let log_handle = Arc::new(logging::init_logging(&config.logging));
    info!("Configuration loaded from {:?}", config_path);

    // Store and domain stores share one connection.
    let db = Db::open(&config.database.path)
        .with_context(|| format!("Failed to open database at {:?}", config.database.path))?;
    let catalog = Arc::new(SqliteCatalog::new(db.clone()));
    let registry = Arc::new(SqliteRegistry::new(db.clone()));
    let settings_store = Arc::new(SettingsStore::new(db.clone()));
    let watches = Arc::new(WatchStore::new(db.clone()));
    let history = Arc::new(HistoryStore::new(db.clone()));
    let cache = Arc::new(SearchCache::new(db.clone()));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Persisted log level wins over the boot default.
    let settings = settings_store.load().context("Failed to load settings")?;
    if settings.log_level != config.logging.level {
        if let Err(e) = log_handle.set_level(&settings.log_level) {
            error!("Invalid persisted log level: {e}");
        }
    }

    let limits = Arc::new(SearchLimits::new(
        config.scheduler.global_concurrency,
        config.scheduler.per_indexer_concurrency,
    ));
    let searcher = Arc::new(EventSearcher::new(Arc::clone(&limits)));
    let newznab = Arc::new(NewznabClient::new());
    let downloader_hub = Arc::new(DownloaderHub::new(Arc::clone(&clock)));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&registry),
        config.notify.apprise_gateway.clone(),
    ));
    let provider = Arc::new(F1ApiClient::new(&config.provider));
    let importer = Arc::new(SeasonImporter::new(Arc::clone(&catalog), Arc::clone(&clock)));

    let scheduler = Scheduler::new(
        Arc::clone(&watches),
        Arc::clone(&catalog),
        Arc::clone(&registry),
        Arc::clone(&settings_store),
        Arc::clone(&history),
        Arc::clone(&cache),
        Arc::clone(&searcher) as Arc<dyn ReleaseSearcher>,
        Arc::clone(&downloader_hub) as Arc<dyn DownloadClient>,
        Arc::clone(&dispatcher) as Arc<dyn Notifier>,
        Arc::clone(&clock),
        config.scheduler.global_concurrency,
    );
    scheduler.start();

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        catalog,
        registry,
        settings: settings_store,
        watches,
        history,
        scheduler: Arc::clone(&scheduler),
        importer,
        provider,
        newznab,
        downloader: downloader_hub,
        dispatcher,
        clock,
        log_handle,
    });

    let app = create_router(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop accepting work and give in-flight jobs a bounded window.
    info!("Shutting down");
    tokio::time::timeout(SHUTDOWN_GRACE, scheduler.stop())
        .await
        .unwrap_or_else(|_| error!("Scheduler did not stop within grace period"));

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
