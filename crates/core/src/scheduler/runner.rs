//! The rules engine: ticks over due watch entries, searches, auto-grabs,
//! polls sends, and keeps every state transition in the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{fingerprint, SearchCache, DEFAULT_TTL_HOURS};
use crate::catalog::{EventType, Round, SqliteCatalog};
use crate::clock::Clock;
use crate::downloader::{DownloadClient, SendRequest};
use crate::history::{HistoryStatus, HistoryStore, NewHistoryEntry};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::redact::redact;
use crate::registry::{Downloader, SqliteRegistry};
use crate::searcher::{
    pick_best, EventSearchRequest, ReleaseCandidate, ReleaseSearcher, SearchError,
};
use crate::settings::{Settings, SettingsStore};
use crate::watch::{WatchEntry, WatchStatus, WatchStore};

use super::cadence::{self, Cadence, FAILED_DOWNLOAD_COOLDOWN};
use super::types::{RoundGrabResult, RoundSearchResponse, SchedulerError, SchedulerStatus};

/// Poll cap for WaitingDownload entries.
const MAX_POLL_INTERVAL_SECS: u64 = 5 * 60;
/// Safety retry window while a send is waiting on the downloader.
const WAITING_SAFETY_HOURS: i64 = 6;

pub struct Scheduler {
    watches: Arc<WatchStore>,
    catalog: Arc<SqliteCatalog>,
    registry: Arc<SqliteRegistry>,
    settings: Arc<SettingsStore>,
    history: Arc<HistoryStore>,
    cache: Arc<SearchCache>,
    searcher: Arc<dyn ReleaseSearcher>,
    downloader: Arc<dyn DownloadClient>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,

    workers: Arc<Semaphore>,
    /// Serializes work per event id: a scheduled run and a round auto-grab
    /// can never send for the same session concurrently.
    event_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        watches: Arc<WatchStore>,
        catalog: Arc<SqliteCatalog>,
        registry: Arc<SqliteRegistry>,
        settings: Arc<SettingsStore>,
        history: Arc<HistoryStore>,
        cache: Arc<SearchCache>,
        searcher: Arc<dyn ReleaseSearcher>,
        downloader: Arc<dyn DownloadClient>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        global_concurrency: usize,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            watches,
            catalog,
            registry,
            settings,
            history,
            cache,
            searcher,
            downloader,
            notifier,
            clock,
            workers: Arc::new(Semaphore::new(global_concurrency.max(1))),
            event_locks: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        })
    }

    /// Spawn the tick and poll loops.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }
        info!("Scheduler started");
        self.spawn_tick_loop();
        self.spawn_poll_loop();
    }

    /// Stop accepting work and cancel the loops.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        // In-flight runs observe the running flag at their next store write.
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        info!("Scheduler stopped");
    }

    pub fn status(&self) -> SchedulerStatus {
        let entries = self.watches.list().unwrap_or_default();
        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            scheduled: entries
                .iter()
                .filter(|e| e.status == WatchStatus::Scheduled)
                .count(),
            waiting_download: entries
                .iter()
                .filter(|e| e.status == WatchStatus::WaitingDownload)
                .count(),
            failed: entries
                .iter()
                .filter(|e| e.status == WatchStatus::Failed)
                .count(),
        }
    }

    fn spawn_tick_loop(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            info!("Tick loop started");
            loop {
                let tick_seconds = scheduler
                    .settings
                    .load()
                    .map(|s| s.scheduler_tick_seconds)
                    .unwrap_or(600)
                    .max(10);
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Tick loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(StdDuration::from_secs(tick_seconds)) => {
                        if !scheduler.running.load(Ordering::Relaxed) {
                            break;
                        }
                        // The ticker itself never waits on network calls; the
                        // batch runs in its own task, bounded by the worker
                        // pool. Overlap with a slow batch is harmless: claims
                        // are compare-and-set.
                        let batch = Arc::clone(&scheduler);
                        tokio::spawn(async move {
                            if let Err(e) = batch.run_due().await {
                                warn!(error = %e, "Scheduler tick failed");
                            }
                        });
                    }
                }
            }
            info!("Tick loop stopped");
        });
    }

    fn spawn_poll_loop(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            info!("Download poll loop started");
            loop {
                let poll_seconds = scheduler
                    .settings
                    .load()
                    .map(|s| (s.decay_interval_h as u64 * 3600).min(MAX_POLL_INTERVAL_SECS))
                    .unwrap_or(MAX_POLL_INTERVAL_SECS)
                    .max(10);
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Download poll loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(StdDuration::from_secs(poll_seconds)) => {
                        if !scheduler.running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = scheduler.poll_downloads().await {
                            warn!(error = %e, "Download poll failed");
                        }
                    }
                }
            }
            info!("Download poll loop stopped");
        });
    }

    /// One tick: dispatch every due entry to the bounded worker pool.
    pub async fn run_due(&self) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let due = self.watches.due(now)?;
        if due.is_empty() {
            return Ok(());
        }
        debug!(count = due.len(), "Dispatching due watch entries");

        let runs = due.into_iter().map(|entry| async move {
            let _permit = self.workers.acquire().await.expect("semaphore closed");
            if !self.running.load(Ordering::Relaxed) {
                return;
            }
            let entry_id = entry.id;
            if let Err(e) = self.run_entry(entry).await {
                warn!(entry = entry_id, error = %e, "Watch entry run failed");
            }
        });
        futures::future::join_all(runs).await;
        Ok(())
    }

    /// Operator run-now: execute one entry immediately, outside the tick.
    pub async fn run_now(&self, entry_id: i64) -> Result<WatchEntry, SchedulerError> {
        let now = self.clock.now();
        self.watches.set_due_now(entry_id, now)?;
        let entry = self
            .watches
            .get(entry_id)?
            .ok_or_else(|| SchedulerError::NotFound(format!("watch entry {entry_id}")))?;
        self.run_entry(entry).await?;
        self.watches
            .get(entry_id)?
            .ok_or_else(|| SchedulerError::NotFound(format!("watch entry {entry_id}")))
    }

    async fn event_lock(&self, event_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.event_locks.lock().await;
        Arc::clone(locks.entry(event_id).or_default())
    }

    /// Execute one watch entry through the state machine.
    async fn run_entry(&self, entry: WatchEntry) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let settings = self.settings.load()?;
        let effective = entry
            .quality_overrides
            .as_ref()
            .map(|o| o.apply(&settings))
            .unwrap_or_else(|| settings.clone());

        let Some(round) = self.catalog.get_round(entry.round_id)? else {
            // Round deleted under the entry: fatal.
            let token = Uuid::new_v4().to_string();
            if self.watches.claim_for_run(entry.id, &token, now)? {
                self.watches
                    .finish_failed(entry.id, &token, "Round not found")?;
            }
            return Ok(());
        };
        if self.catalog.round_season_hidden(round.id)? {
            return Ok(());
        }

        let event = self.catalog.get_event(entry.round_id, entry.event_type)?;
        let start = event.as_ref().and_then(|e| e.start_time_utc);

        match cadence::plan(start, now, &effective) {
            Cadence::Expired => {
                self.watches.mark_completed(entry.id, Some("Expired"))?;
                info!(entry = entry.id, "Watch entry expired");
                return Ok(());
            }
            Cadence::Gated { next_run } => {
                let next = cadence::apply_jitter(next_run, effective.jitter_seconds);
                self.watches.defer(entry.id, next, None)?;
                return Ok(());
            }
            Cadence::Tbd { next_run } => {
                let next = cadence::apply_jitter(next_run, effective.jitter_seconds);
                self.watches
                    .defer(entry.id, next, Some("Session start unknown"))?;
                return Ok(());
            }
            Cadence::Ready { next_run } => {
                let next_on_miss = cadence::apply_jitter(next_run, effective.jitter_seconds);
                if !effective.allows_event(entry.event_type) {
                    self.watches
                        .defer(entry.id, next_on_miss, Some("Event type disallowed"))?;
                    return Ok(());
                }

                let Some(event) = event else {
                    let token = Uuid::new_v4().to_string();
                    if self.watches.claim_for_run(entry.id, &token, now)? {
                        self.watches.finish_failed(
                            entry.id,
                            &token,
                            "Session missing from round",
                        )?;
                    }
                    return Ok(());
                };

                let lock = self.event_lock(event.id).await;
                let _guard = lock.lock().await;

                let token = Uuid::new_v4().to_string();
                if !self.watches.claim_for_run(entry.id, &token, now)? {
                    return Ok(()); // someone else picked it up
                }
                self.execute_search(&entry, &token, &round, event.id, &effective, next_on_miss)
                    .await
            }
        }
    }

    /// Running state: fan out, score, auto-grab or reschedule.
    async fn execute_search(
        &self,
        entry: &WatchEntry,
        token: &str,
        round: &Round,
        event_id: i64,
        settings: &Settings,
        next_on_miss: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let year = self.round_year(round)?;
        let indexers = self.registry.list_indexers(true)?;
        if indexers.is_empty() {
            self.watches
                .finish_failed(entry.id, token, "No enabled indexers")?;
            return Ok(());
        }

        let request = EventSearchRequest {
            year,
            round: round.clone(),
            event_type: entry.event_type,
            settings: settings.clone(),
            session_started: true,
        };

        let outcome = match self.searcher.search_event(&indexers, &request).await {
            Ok(outcome) => outcome,
            Err(e) if search_is_transient(&e) => {
                let entry_now = self.watches.get(entry.id)?;
                let attempts = entry_now.map(|e| e.attempts).unwrap_or(1);
                let cooldown = cadence::transient_cooldown(attempts, settings);
                self.watches.finish_rescheduled(
                    entry.id,
                    token,
                    now + cooldown,
                    Some(&redact(&e.to_string())),
                )?;
                return Ok(());
            }
            Err(e) => {
                self.watches
                    .finish_failed(entry.id, token, &redact(&e.to_string()))?;
                return Ok(());
            }
        };

        let best = pick_best(&outcome.candidates, settings.auto_download_threshold);
        let Some(best) = best.cloned() else {
            self.watches.finish_rescheduled(
                entry.id,
                token,
                next_on_miss,
                Some("No result above threshold"),
            )?;
            return Ok(());
        };

        match self.resolve_downloader(entry, settings)? {
            Some(downloader) => {
                self.send_candidate(entry, token, event_id, &downloader, &best)
                    .await
            }
            None => {
                self.watches
                    .finish_failed(entry.id, token, "No enabled downloaders")?;
                Ok(())
            }
        }
    }

    /// Downloader resolution: entry override, settings default, then the
    /// lowest-id enabled one.
    fn resolve_downloader(
        &self,
        entry: &WatchEntry,
        settings: &Settings,
    ) -> Result<Option<Downloader>, SchedulerError> {
        if let Some(id) = entry.downloader_id {
            if let Some(downloader) = self.registry.get_downloader(id)? {
                if downloader.enabled {
                    return Ok(Some(downloader));
                }
            }
        }
        if let Some(id) = settings.default_downloader_id {
            if let Some(downloader) = self.registry.get_downloader(id)? {
                if downloader.enabled {
                    return Ok(Some(downloader));
                }
            }
        }
        Ok(self.registry.list_downloaders(true)?.into_iter().next())
    }

    async fn send_candidate(
        &self,
        entry: &WatchEntry,
        token: &str,
        event_id: i64,
        downloader: &Downloader,
        best: &ReleaseCandidate,
    ) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let tag = entry.send_tag();
        let titled = format!("{} [{}]", best.title, tag);
        let request = SendRequest {
            nzb_url: best.nzb_url.clone(),
            title: titled,
            category: downloader.category.clone(),
            priority: downloader.priority,
        };

        match self.downloader.send(downloader, &request).await {
            Ok(acquisition_id) => {
                self.watches.finish_waiting_download(
                    entry.id,
                    token,
                    &best.title,
                    &acquisition_id.0,
                    downloader.id,
                    now + Duration::hours(WAITING_SAFETY_HOURS),
                )?;
                self.history.append(
                    NewHistoryEntry {
                        event_id,
                        indexer_id: Some(best.indexer_id),
                        downloader_id: downloader.id,
                        nzb_title: best.title.clone(),
                        nzb_url: best.nzb_url.clone(),
                        score: best.score,
                    },
                    now,
                )?;
                info!(
                    entry = entry.id,
                    title = %best.title,
                    score = best.score,
                    downloader = %downloader.name,
                    "Release sent to downloader"
                );
                self.notifier
                    .notify(Notification {
                        kind: NotificationKind::DownloadStart,
                        title: "Racecarr".to_string(),
                        body: format!("Grabbed {} ({})", best.title, downloader.name),
                        payload: json!({
                            "entry_id": entry.id,
                            "event_type": entry.event_type,
                            "title": best.title,
                            "score": best.score,
                        }),
                    })
                    .await;
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                let entry_now = self.watches.get(entry.id)?;
                let attempts = entry_now.map(|e| e.attempts).unwrap_or(1);
                let settings = self.settings.load()?;
                let cooldown = cadence::transient_cooldown(attempts, &settings);
                self.watches.finish_rescheduled(
                    entry.id,
                    token,
                    now + cooldown,
                    Some(&redact(&e.to_string())),
                )?;
                Ok(())
            }
            Err(e) => {
                self.watches
                    .finish_failed(entry.id, token, &redact(&e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Poll every WaitingDownload entry against its downloader.
    pub async fn poll_downloads(&self) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let waiting = self.watches.waiting_download()?;
        for entry in waiting {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = self.poll_one(&entry, now).await {
                warn!(entry = entry.id, error = %e, "Download poll failed for entry");
            }
        }
        Ok(())
    }

    async fn poll_one(&self, entry: &WatchEntry, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        let Some(downloader_id) = entry.downloader_id else {
            self.watches.return_to_scheduled(
                entry.id,
                now + FAILED_DOWNLOAD_COOLDOWN,
                Some("Missing downloader"),
            )?;
            return Ok(());
        };
        let Some(downloader) = self.registry.get_downloader(downloader_id)? else {
            self.watches.return_to_scheduled(
                entry.id,
                now + FAILED_DOWNLOAD_COOLDOWN,
                Some("Downloader not available"),
            )?;
            return Ok(());
        };
        let Some(acquisition_id) = entry.acquisition_id.clone() else {
            return Ok(());
        };

        let event_id = self
            .catalog
            .get_event(entry.round_id, entry.event_type)?
            .map(|e| e.id);
        let status = self
            .downloader
            .status(
                &downloader,
                &crate::downloader::AcquisitionId(acquisition_id),
            )
            .await;

        match status {
            Ok(crate::downloader::AcquisitionStatus::Completed) => {
                self.watches.mark_completed(entry.id, None)?;
                if let Some(event_id) = event_id {
                    self.update_history(event_id, HistoryStatus::Completed, now)?;
                }
                info!(entry = entry.id, "Download completed");
                self.notifier
                    .notify(Notification {
                        kind: NotificationKind::DownloadComplete,
                        title: "Racecarr".to_string(),
                        body: format!(
                            "Download complete: {}",
                            entry.chosen_nzb.as_deref().unwrap_or("release")
                        ),
                        payload: json!({ "entry_id": entry.id }),
                    })
                    .await;
            }
            Ok(crate::downloader::AcquisitionStatus::Failed) => {
                self.watches.return_to_scheduled(
                    entry.id,
                    now + FAILED_DOWNLOAD_COOLDOWN,
                    Some("Downloader reported failure"),
                )?;
                if let Some(event_id) = event_id {
                    self.update_history(event_id, HistoryStatus::Failed, now)?;
                }
                warn!(entry = entry.id, "Download failed, rescheduled");
                self.notifier
                    .notify(Notification {
                        kind: NotificationKind::DownloadFail,
                        title: "Racecarr".to_string(),
                        body: format!(
                            "Download failed: {}",
                            entry.chosen_nzb.as_deref().unwrap_or("release")
                        ),
                        payload: json!({ "entry_id": entry.id }),
                    })
                    .await;
            }
            Ok(crate::downloader::AcquisitionStatus::Downloading) => {
                if let Some(event_id) = event_id {
                    self.update_history(event_id, HistoryStatus::Downloading, now)?;
                }
            }
            Ok(_) => {}
            Err(e) => {
                // Downloader outages are transient; keep waiting.
                debug!(entry = entry.id, error = %e, "Status poll error");
            }
        }
        Ok(())
    }

    fn update_history(
        &self,
        event_id: i64,
        status: HistoryStatus,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        if let Some(latest) = self.history.latest_for_event(event_id)? {
            self.history.update_status(latest.id, status, now)?;
        }
        Ok(())
    }

    fn round_year(&self, round: &Round) -> Result<i32, SchedulerError> {
        self.catalog
            .get_season(round.season_id)?
            .map(|s| s.year)
            .ok_or_else(|| SchedulerError::NotFound(format!("season {}", round.season_id)))
    }

    /// Operator round search: fan out over the round's allowed session types,
    /// serve from cache unless forced, and cache the merged result.
    pub async fn search_round(
        &self,
        round_id: i64,
        force: bool,
    ) -> Result<RoundSearchResponse, SchedulerError> {
        let now = self.clock.now();
        let settings = self.settings.load()?;
        let round = self
            .catalog
            .get_round(round_id)?
            .ok_or_else(|| SchedulerError::NotFound(format!("round {round_id}")))?;

        let round_types: Vec<EventType> = self
            .catalog
            .list_events(round_id)?
            .iter()
            .map(|e| e.event_type)
            .filter(|t| *t != EventType::Other)
            .collect();
        let allowed = settings.allowed_among(&round_types);
        let fp = fingerprint(&allowed);

        if !force {
            if let Some(hit) = self.cache.read(round_id, &fp, now)? {
                return Ok(RoundSearchResponse {
                    results: hit.results,
                    from_cache: true,
                    cached_at: Some(hit.cached_at),
                    ttl_hours: hit.ttl_hours,
                });
            }
        }

        let indexers = self.registry.list_indexers(true)?;
        if indexers.is_empty() {
            return Err(SchedulerError::Configuration(
                "no enabled indexers".to_string(),
            ));
        }
        let year = self.round_year(&round)?;

        let mut results: Vec<ReleaseCandidate> = Vec::new();
        for event_type in &allowed {
            let request = EventSearchRequest {
                year,
                round: round.clone(),
                event_type: *event_type,
                settings: settings.clone(),
                session_started: true,
            };
            match self.searcher.search_event(&indexers, &request).await {
                Ok(outcome) => results.extend(outcome.candidates),
                Err(SearchError::AllIndexersFailed(errors)) => {
                    warn!(round = round_id, ?errors, "All indexers failed for session");
                }
                Err(e) => return Err(e.into()),
            }
        }
        results.sort_by(|a, b| b.score.cmp(&a.score));
        let mut seen = std::collections::HashSet::new();
        results.retain(|c| seen.insert(c.nzb_url.clone()));

        self.cache.write(round_id, &fp, &results, now)?;
        Ok(RoundSearchResponse {
            results,
            from_cache: false,
            cached_at: None,
            ttl_hours: DEFAULT_TTL_HOURS,
        })
    }

    /// Operator round auto-grab: one pass over the round's sessions, at most
    /// one send per event, serialized against scheduled runs per event.
    pub async fn auto_grab_round(
        &self,
        round_id: i64,
        event_types: Option<Vec<EventType>>,
    ) -> Result<Vec<RoundGrabResult>, SchedulerError> {
        let now = self.clock.now();
        let settings = self.settings.load()?;
        let round = self
            .catalog
            .get_round(round_id)?
            .ok_or_else(|| SchedulerError::NotFound(format!("round {round_id}")))?;
        let year = self.round_year(&round)?;

        let indexers = self.registry.list_indexers(true)?;
        if indexers.is_empty() {
            return Err(SchedulerError::Configuration(
                "no enabled indexers".to_string(),
            ));
        }

        let events = self.catalog.list_events(round_id)?;
        let mut results = Vec::new();

        for event in events {
            if let Some(filter) = &event_types {
                if !filter.contains(&event.event_type) {
                    continue;
                }
            }
            if !settings.allows_event(event.event_type) {
                continue;
            }

            let lock = self.event_lock(event.id).await;
            let _guard = lock.lock().await;

            let request = EventSearchRequest {
                year,
                round: round.clone(),
                event_type: event.event_type,
                settings: settings.clone(),
                session_started: true,
            };
            let outcome = match self.searcher.search_event(&indexers, &request).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    results.push(RoundGrabResult {
                        event_type: event.event_type,
                        sent: false,
                        title: None,
                        score: None,
                        detail: Some(redact(&e.to_string())),
                    });
                    continue;
                }
            };

            let Some(best) =
                pick_best(&outcome.candidates, settings.auto_download_threshold).cloned()
            else {
                results.push(RoundGrabResult {
                    event_type: event.event_type,
                    sent: false,
                    title: None,
                    score: None,
                    detail: Some("No result above threshold".to_string()),
                });
                continue;
            };

            let Some(downloader) = self.resolve_downloader_for_round(&settings)? else {
                return Err(SchedulerError::Configuration(
                    "no enabled downloaders".to_string(),
                ));
            };

            let request = SendRequest {
                nzb_url: best.nzb_url.clone(),
                title: format!(
                    "{} [rc-{}-{}]",
                    best.title,
                    round_id,
                    event.event_type.as_str().to_lowercase()
                ),
                category: downloader.category.clone(),
                priority: downloader.priority,
            };
            match self.downloader.send(&downloader, &request).await {
                Ok(_) => {
                    self.history.append(
                        NewHistoryEntry {
                            event_id: event.id,
                            indexer_id: Some(best.indexer_id),
                            downloader_id: downloader.id,
                            nzb_title: best.title.clone(),
                            nzb_url: best.nzb_url.clone(),
                            score: best.score,
                        },
                        now,
                    )?;
                    self.notifier
                        .notify(Notification {
                            kind: NotificationKind::DownloadStart,
                            title: "Racecarr".to_string(),
                            body: format!("Grabbed {} ({})", best.title, downloader.name),
                            payload: json!({
                                "round_id": round_id,
                                "event_type": event.event_type,
                                "title": best.title,
                                "score": best.score,
                            }),
                        })
                        .await;
                    results.push(RoundGrabResult {
                        event_type: event.event_type,
                        sent: true,
                        title: Some(best.title.clone()),
                        score: Some(best.score),
                        detail: None,
                    });
                }
                Err(e) => {
                    error!(round = round_id, event = %event.event_type, error = %e, "Send failed");
                    results.push(RoundGrabResult {
                        event_type: event.event_type,
                        sent: false,
                        title: Some(best.title.clone()),
                        score: Some(best.score),
                        detail: Some(redact(&e.to_string())),
                    });
                }
            }
        }

        Ok(results)
    }

    fn resolve_downloader_for_round(
        &self,
        settings: &Settings,
    ) -> Result<Option<Downloader>, SchedulerError> {
        if let Some(id) = settings.default_downloader_id {
            if let Some(downloader) = self.registry.get_downloader(id)? {
                if downloader.enabled {
                    return Ok(Some(downloader));
                }
            }
        }
        Ok(self.registry.list_downloaders(true)?.into_iter().next())
    }
}

fn search_is_transient(e: &SearchError) -> bool {
    e.is_retryable() || matches!(e, SearchError::AllIndexersFailed(_))
}
