//! Operator round search and round auto-grab integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use racecarr_core::{
    cache::SearchCache,
    catalog::{EventType, RoundUpsert, SqliteCatalog},
    clock::{Clock, FixedClock},
    db::Db,
    downloader::DownloadClient,
    history::HistoryStore,
    notify::Notifier,
    registry::{DownloaderKind, IndexerKind, NewDownloader, NewIndexer, SqliteRegistry},
    scheduler::Scheduler,
    searcher::ReleaseSearcher,
    settings::{Settings, SettingsStore},
    testing::{fixtures, MockDownloadClient, MockNotifier, MockSearcher},
    watch::WatchStore,
};

const RACE_TITLE: &str = "Formula.1.2025.Round03.Bahrain.Race.1080p.x265-NTb";

struct TestHarness {
    catalog: Arc<SqliteCatalog>,
    searcher: Arc<MockSearcher>,
    downloader: Arc<MockDownloadClient>,
    clock: Arc<FixedClock>,
    scheduler: Arc<Scheduler>,
    round_id: i64,
}

fn race_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 16, 15, 0, 0).unwrap()
}

impl TestHarness {
    fn new() -> Self {
        let db = Db::in_memory().expect("in-memory db");
        let catalog = Arc::new(SqliteCatalog::new(db.clone()));
        let registry = Arc::new(SqliteRegistry::new(db.clone()));
        let settings_store = Arc::new(SettingsStore::new(db.clone()));
        let watches = Arc::new(WatchStore::new(db.clone()));
        let history = Arc::new(HistoryStore::new(db.clone()));
        let cache = Arc::new(SearchCache::new(db.clone()));

        let season = catalog.upsert_season(2025).unwrap();
        let round = catalog
            .upsert_round(
                season.id,
                &RoundUpsert {
                    round_number: 3,
                    name: "Bahrain Grand Prix".to_string(),
                    circuit: None,
                    country: Some("Bahrain".to_string()),
                    circuit_tz: None,
                },
            )
            .unwrap();
        catalog
            .upsert_event(
                round.id,
                EventType::Qualifying,
                Some(race_start() - Duration::days(1)),
                None,
            )
            .unwrap();
        catalog
            .upsert_event(round.id, EventType::Race, Some(race_start()), None)
            .unwrap();

        registry
            .create_indexer(NewIndexer {
                name: "nzbfinder".to_string(),
                kind: IndexerKind::Newznab,
                base_url: "https://nzbfinder.example".to_string(),
                api_key: None,
                category_ids: vec![],
                priority: 0,
                enabled: true,
            })
            .unwrap();
        registry
            .create_downloader(NewDownloader {
                name: "nzbget".to_string(),
                kind: DownloaderKind::Nzbget,
                base_url: "http://nzbget.example:6789".to_string(),
                api_key: None,
                category: None,
                priority: 0,
                enabled: true,
            })
            .unwrap();
        settings_store.save(&Settings::default()).unwrap();

        let searcher = Arc::new(MockSearcher::new());
        let downloader = Arc::new(MockDownloadClient::new());
        let notifier = Arc::new(MockNotifier::new());
        let clock = Arc::new(FixedClock::new(race_start() + Duration::hours(2)));

        let scheduler = Scheduler::new(
            watches,
            Arc::clone(&catalog),
            registry,
            settings_store,
            history,
            cache,
            Arc::clone(&searcher) as Arc<dyn ReleaseSearcher>,
            Arc::clone(&downloader) as Arc<dyn DownloadClient>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            3,
        );

        Self {
            catalog,
            searcher,
            downloader,
            clock,
            scheduler,
            round_id: round.id,
        }
    }
}

#[tokio::test]
async fn test_round_search_populates_cache_then_serves_from_it() {
    let harness = TestHarness::new();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(RACE_TITLE, 115)])
        .await;

    let first = harness
        .scheduler
        .search_round(harness.round_id, false)
        .await
        .unwrap();
    assert!(!first.from_cache);
    assert!(!first.results.is_empty());
    // One fan-out per allowed session type on the round.
    let first_fanout = harness.searcher.request_count().await;
    assert_eq!(first_fanout, 2);

    let second = harness
        .scheduler
        .search_round(harness.round_id, false)
        .await
        .unwrap();
    assert!(second.from_cache);
    assert!(second.cached_at.is_some());
    assert_eq!(second.ttl_hours, 24);
    // No new queries were executed.
    assert_eq!(harness.searcher.request_count().await, first_fanout);
}

#[tokio::test]
async fn test_round_search_force_bypasses_and_overwrites() {
    let harness = TestHarness::new();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(RACE_TITLE, 115)])
        .await;

    harness
        .scheduler
        .search_round(harness.round_id, false)
        .await
        .unwrap();
    let baseline = harness.searcher.request_count().await;

    // Ten seconds later with force=true: queries run again.
    harness.clock.advance(Duration::seconds(10));
    let forced = harness
        .scheduler
        .search_round(harness.round_id, true)
        .await
        .unwrap();
    assert!(!forced.from_cache);
    assert!(harness.searcher.request_count().await > baseline);

    // And the refreshed value replaced the cached one.
    let after = harness
        .scheduler
        .search_round(harness.round_id, false)
        .await
        .unwrap();
    assert!(after.from_cache);
}

#[tokio::test]
async fn test_cache_expires_after_ttl() {
    let harness = TestHarness::new();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(RACE_TITLE, 115)])
        .await;

    harness
        .scheduler
        .search_round(harness.round_id, false)
        .await
        .unwrap();

    harness.clock.advance(Duration::hours(25));
    let after_ttl = harness
        .scheduler
        .search_round(harness.round_id, false)
        .await
        .unwrap();
    assert!(!after_ttl.from_cache);
}

#[tokio::test]
async fn test_round_auto_grab_sends_one_per_event() {
    let harness = TestHarness::new();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(RACE_TITLE, 115)])
        .await;

    let results = harness
        .scheduler
        .auto_grab_round(harness.round_id, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.sent));
    assert_eq!(harness.downloader.send_count().await, 2);
}

#[tokio::test]
async fn test_round_auto_grab_honors_event_filter() {
    let harness = TestHarness::new();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(RACE_TITLE, 115)])
        .await;

    let results = harness
        .scheduler
        .auto_grab_round(harness.round_id, Some(vec![EventType::Race]))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].event_type, EventType::Race);
    assert_eq!(harness.downloader.send_count().await, 1);
}

#[tokio::test]
async fn test_round_auto_grab_below_threshold_sends_nothing() {
    let harness = TestHarness::new();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(
            "F1 2025 Bahrain Race Preview 720p",
            35,
        )])
        .await;

    let results = harness
        .scheduler
        .auto_grab_round(harness.round_id, None)
        .await
        .unwrap();

    assert!(results.iter().all(|r| !r.sent));
    assert_eq!(harness.downloader.send_count().await, 0);
}

#[tokio::test]
async fn test_round_search_unknown_round_is_not_found() {
    let harness = TestHarness::new();
    let result = harness.scheduler.search_round(999, false).await;
    assert!(matches!(
        result,
        Err(racecarr_core::SchedulerError::NotFound(_))
    ));
    // Catalog unaffected.
    assert!(harness.catalog.get_round(999).unwrap().is_none());
}
