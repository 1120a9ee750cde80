//! Scheduler lifecycle integration tests.
//!
//! Exercises the watch entry state machine end to end with mocked searcher,
//! download client and notifier: auto-grab, below-threshold reschedule,
//! download failure recovery, expiry, and pause semantics.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use racecarr_core::{
    cache::SearchCache,
    catalog::{EventType, RoundUpsert, SqliteCatalog},
    clock::{Clock, FixedClock},
    db::Db,
    downloader::{AcquisitionStatus, DownloadClient},
    history::{HistoryStatus, HistoryStore},
    notify::{NotificationKind, Notifier},
    registry::{DownloaderKind, IndexerKind, NewDownloader, NewIndexer, SqliteRegistry},
    scheduler::Scheduler,
    searcher::ReleaseSearcher,
    settings::{Settings, SettingsStore},
    testing::{fixtures, MockDownloadClient, MockNotifier, MockSearcher},
    watch::{NewWatchEntry, WatchStatus, WatchStore},
};

const TITLE_A: &str = "Formula.1.2025.Round03.Bahrain.Qualifying.1080p.x265-NTb";
const TITLE_B: &str = "F1 2025 Bahrain Qualifying Preview 720p";

struct TestHarness {
    watches: Arc<WatchStore>,
    catalog: Arc<SqliteCatalog>,
    history: Arc<HistoryStore>,
    searcher: Arc<MockSearcher>,
    downloader: Arc<MockDownloadClient>,
    notifier: Arc<MockNotifier>,
    clock: Arc<FixedClock>,
    scheduler: Arc<Scheduler>,
    round_id: i64,
}

fn qualy_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 16, 0, 0).unwrap()
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
                    circuit: Some("Bahrain International Circuit".to_string()),
                    country: Some("Bahrain".to_string()),
                    circuit_tz: Some("Asia/Bahrain".to_string()),
                },
            )
            .unwrap();
        catalog
            .upsert_event(round.id, EventType::Qualifying, Some(qualy_start()), None)
            .unwrap();
        catalog
            .upsert_event(
                round.id,
                EventType::Race,
                Some(qualy_start() + Duration::days(1)),
                None,
            )
            .unwrap();

        registry
            .create_indexer(NewIndexer {
                name: "nzbfinder".to_string(),
                kind: IndexerKind::Newznab,
                base_url: "https://nzbfinder.example".to_string(),
                api_key: Some("key".to_string()),
                category_ids: vec![5070],
                priority: 0,
                enabled: true,
            })
            .unwrap();
        registry
            .create_downloader(NewDownloader {
                name: "sab".to_string(),
                kind: DownloaderKind::Sabnzbd,
                base_url: "http://sab.example:8080".to_string(),
                api_key: Some("sabkey".to_string()),
                category: Some("f1".to_string()),
                priority: 0,
                enabled: true,
            })
            .unwrap();

        settings_store
            .save(&Settings {
                auto_download_threshold: 70,
                allow_hdr: false,
                min_resolution: 720,
                max_resolution: 1080,
                preferred_codecs: vec!["x265".to_string()],
                preferred_groups: vec!["NTb".to_string()],
                ..Default::default()
            })
            .unwrap();

        let searcher = Arc::new(MockSearcher::new());
        let downloader = Arc::new(MockDownloadClient::new());
        let notifier = Arc::new(MockNotifier::new());
        // First tick lands inside the aggressive window.
        let clock = Arc::new(FixedClock::new(
            qualy_start() + Duration::minutes(30) + Duration::seconds(30),
        ));

        let scheduler = Scheduler::new(
            Arc::clone(&watches),
            Arc::clone(&catalog),
            Arc::clone(&registry),
            Arc::clone(&settings_store),
            Arc::clone(&history),
            Arc::clone(&cache),
            Arc::clone(&searcher) as Arc<dyn ReleaseSearcher>,
            Arc::clone(&downloader) as Arc<dyn DownloadClient>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            3,
        );

        Self {
            watches,
            catalog,
            history,
            searcher,
            downloader,
            notifier,
            clock,
            scheduler,
            round_id: round.id,
        }
    }

    fn add_watch(&self, event_type: EventType) -> i64 {
        let now = self.clock.now();
        self.watches
            .create(
                &NewWatchEntry {
                    round_id: self.round_id,
                    event_type,
                    downloader_id: None,
                    quality_overrides: None,
                },
                Some(now - Duration::seconds(1)),
                now,
            )
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn test_auto_grab_hit_sends_and_waits() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    harness
        .searcher
        .set_default_candidates(vec![
            fixtures::candidate(TITLE_A, 130),
            fixtures::candidate(TITLE_B, 35),
        ])
        .await;

    harness.scheduler.run_due().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::WaitingDownload);
    assert_eq!(entry.chosen_nzb.as_deref(), Some(TITLE_A));
    assert!(entry.acquisition_id.is_some());
    assert_eq!(entry.attempts, 1);

    // Sent title carries the history-matching tag.
    let sends = harness.downloader.sends().await;
    assert_eq!(sends.len(), 1);
    assert!(sends[0].title.starts_with(TITLE_A));
    assert!(sends[0].title.contains("[rc-"));

    // One history row in Sent state.
    let event = harness
        .catalog
        .get_event(harness.round_id, EventType::Qualifying)
        .unwrap()
        .unwrap();
    let rows = harness.history.list_for_event(event.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, HistoryStatus::Sent);
    assert_eq!(rows[0].score, 130);

    assert_eq!(
        harness.notifier.kinds().await,
        vec![NotificationKind::DownloadStart]
    );
}

#[tokio::test]
async fn test_below_threshold_reschedules_in_aggressive_window() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(TITLE_B, 35)])
        .await;

    harness.scheduler.run_due().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Scheduled);
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.last_error.as_deref(), Some("No result above threshold"));
    assert_eq!(harness.downloader.send_count().await, 0);
    assert!(harness.notifier.notifications().await.is_empty());

    // Aggressive window: next run one tick out, within jitter bounds.
    let delta = (entry.next_run_at.unwrap() - harness.clock.now()).num_seconds();
    assert!((480..=720).contains(&delta), "delta was {delta}");
}

#[tokio::test]
async fn test_hard_mismatch_never_sent() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    // High score but contradictory year: must not be auto-grabbed.
    harness
        .searcher
        .set_default_candidates(vec![fixtures::mismatched_candidate(
            "Formula.1.2024.Round03.Bahrain.Qualifying.1080p.x265-NTb",
            95,
        )])
        .await;

    harness.scheduler.run_due().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Scheduled);
    assert_eq!(harness.downloader.send_count().await, 0);
}

#[tokio::test]
async fn test_download_failure_recovery() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(TITLE_A, 130)])
        .await;
    harness.scheduler.run_due().await.unwrap();

    // Ten minutes later the downloader reports failure.
    harness.clock.advance(Duration::minutes(10));
    harness
        .downloader
        .push_status(AcquisitionStatus::Failed)
        .await;
    harness.scheduler.poll_downloads().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Scheduled);
    assert_eq!(entry.attempts, 2);
    let delta = (entry.next_run_at.unwrap() - harness.clock.now()).num_seconds();
    assert_eq!(delta, 3600);

    let kinds = harness.notifier.kinds().await;
    assert_eq!(
        kinds,
        vec![NotificationKind::DownloadStart, NotificationKind::DownloadFail]
    );

    let event = harness
        .catalog
        .get_event(harness.round_id, EventType::Qualifying)
        .unwrap()
        .unwrap();
    let latest = harness.history.latest_for_event(event.id).unwrap().unwrap();
    assert_eq!(latest.status, HistoryStatus::Failed);
}

#[tokio::test]
async fn test_download_completion_is_terminal() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(TITLE_A, 130)])
        .await;
    harness.scheduler.run_due().await.unwrap();

    harness.clock.advance(Duration::minutes(20));
    harness
        .downloader
        .push_status(AcquisitionStatus::Completed)
        .await;
    harness.scheduler.poll_downloads().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Completed);
    assert!(entry.next_run_at.is_none());

    // Terminal monotonicity: further ticks leave the entry alone.
    harness.clock.advance(Duration::hours(12));
    harness.scheduler.run_due().await.unwrap();
    let after = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(after.status, WatchStatus::Completed);
    assert_eq!(after.attempts, entry.attempts);

    assert!(harness
        .notifier
        .kinds()
        .await
        .contains(&NotificationKind::DownloadComplete));
}

#[tokio::test]
async fn test_expired_entry_completes_without_searching() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    // Session start is now 15 days in the past.
    harness.clock.set(qualy_start() + Duration::days(15));
    harness
        .watches
        .set_due_now(entry_id, harness.clock.now())
        .unwrap();

    harness.scheduler.run_due().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Completed);
    assert_eq!(entry.last_error.as_deref(), Some("Expired"));
    assert_eq!(harness.searcher.request_count().await, 0);
}

#[tokio::test]
async fn test_gated_before_first_search_anchor() {
    let harness = TestHarness::new();

    // Five minutes after session start: the first search is gated until
    // start + 30 min and must not query or bump attempts.
    harness.clock.set(qualy_start() + Duration::minutes(5));
    let entry_id = harness.add_watch(EventType::Qualifying);

    harness.scheduler.run_due().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Scheduled);
    assert_eq!(entry.attempts, 0);
    assert_eq!(harness.searcher.request_count().await, 0);

    let anchor = qualy_start() + Duration::minutes(30);
    let delta = (entry.next_run_at.unwrap() - anchor).num_seconds().abs();
    assert!(delta <= 120, "next run {delta}s away from anchor");
}

#[tokio::test]
async fn test_transient_search_error_backs_off() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    harness
        .searcher
        .push_outcome(Err(racecarr_core::searcher::SearchError::Timeout))
        .await;

    harness.scheduler.run_due().await.unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Scheduled);
    assert_eq!(entry.attempts, 1);
    assert!(entry.last_error.is_some());
    // First transient failure: one tick of cooldown.
    let delta = (entry.next_run_at.unwrap() - harness.clock.now()).num_seconds();
    assert_eq!(delta, 600);
}

#[tokio::test]
async fn test_paused_entry_is_never_selected() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);
    harness.watches.pause(entry_id).unwrap();

    harness.scheduler.run_due().await.unwrap();
    assert_eq!(harness.searcher.request_count().await, 0);

    // Resume makes it due immediately.
    harness
        .watches
        .resume(entry_id, harness.clock.now())
        .unwrap();
    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(TITLE_A, 130)])
        .await;
    harness.scheduler.run_due().await.unwrap();
    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::WaitingDownload);
}

#[tokio::test]
async fn test_hidden_season_children_not_ticked() {
    let harness = TestHarness::new();
    let entry_id = harness.add_watch(EventType::Qualifying);

    let season = harness.catalog.get_season_by_year(2025).unwrap().unwrap();
    harness
        .catalog
        .set_season_hidden(season.id, true, harness.clock.now())
        .unwrap();

    let entry = harness.watches.get(entry_id).unwrap().unwrap();
    assert_eq!(entry.status, WatchStatus::Paused);

    harness.scheduler.run_due().await.unwrap();
    assert_eq!(harness.searcher.request_count().await, 0);
}

#[tokio::test]
async fn test_run_now_executes_immediately() {
    let harness = TestHarness::new();
    let now = harness.clock.now();
    // Entry scheduled far in the future; run-now overrides that.
    let entry = harness
        .watches
        .create(
            &NewWatchEntry {
                round_id: harness.round_id,
                event_type: EventType::Qualifying,
                downloader_id: None,
                quality_overrides: None,
            },
            Some(now + Duration::hours(6)),
            now,
        )
        .unwrap();

    harness
        .searcher
        .set_default_candidates(vec![fixtures::candidate(TITLE_A, 130)])
        .await;

    let after = harness.scheduler.run_now(entry.id).await.unwrap();
    assert_eq!(after.status, WatchStatus::WaitingDownload);
    assert_eq!(harness.downloader.send_count().await, 1);
}
