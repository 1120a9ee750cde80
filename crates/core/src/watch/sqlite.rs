//! SQLite-backed watch entry store.
//!
//! Run completions are compare-and-write on the dispatch token, so a late
//! duplicate result can never overwrite a newer state.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::catalog::EventType;
use crate::db::{Db, StoreError};

use super::types::{NewWatchEntry, QualityOverrides, WatchEntry, WatchStatus};

const COLUMNS: &str = "id, round_id, event_type, status, downloader_id, quality_overrides, \
     added_at, last_searched_at, next_run_at, last_error, attempts, chosen_nzb, tag, \
     dispatch_token, acquisition_id";

pub struct WatchStore {
    db: Db,
}

impl WatchStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a watch entry. Idempotent on `(round_id, event_type)`: an
    /// existing entry is returned unchanged.
    pub fn create(
        &self,
        new: &NewWatchEntry,
        next_run_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<WatchEntry, StoreError> {
        if let Some(existing) = self.get_by_key(new.round_id, new.event_type)? {
            return Ok(existing);
        }
        let overrides_json = new
            .quality_overrides
            .as_ref()
            .filter(|o| !o.is_empty())
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let tag = format!(
            "rc-{}-{}",
            new.round_id,
            new.event_type.as_str().to_lowercase()
        );

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scheduled_search
                     (round_id, event_type, status, downloader_id, quality_overrides,
                      added_at, next_run_at, attempts, tag)
                 VALUES (?, ?, 'scheduled', ?, ?, ?, ?, 0, ?)",
                params![
                    new.round_id,
                    new.event_type.as_str(),
                    new.downloader_id,
                    overrides_json,
                    now.to_rfc3339(),
                    next_run_at.map(|t| t.to_rfc3339()),
                    tag,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("watch entry {id}")))
    }

    pub fn get(&self, id: i64) -> Result<Option<WatchEntry>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM scheduled_search WHERE id = ?"),
                params![id],
                row_to_entry,
            )
            .optional()
        })
    }

    pub fn get_by_key(
        &self,
        round_id: i64,
        event_type: EventType,
    ) -> Result<Option<WatchEntry>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM scheduled_search
                     WHERE round_id = ? AND event_type = ?"
                ),
                params![round_id, event_type.as_str()],
                row_to_entry,
            )
            .optional()
        })
    }

    pub fn list(&self) -> Result<Vec<WatchEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_search
                 ORDER BY next_run_at IS NULL, next_run_at ASC, added_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_entry)?;
            rows.collect()
        })
    }

    /// Entries the tick should run now, oldest due first.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<WatchEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_search
                 WHERE status = 'scheduled' AND next_run_at IS NOT NULL AND next_run_at <= ?
                 ORDER BY next_run_at ASC"
            ))?;
            let rows = stmt.query_map(params![now.to_rfc3339()], row_to_entry)?;
            rows.collect()
        })
    }

    pub fn waiting_download(&self) -> Result<Vec<WatchEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_search WHERE status = 'waiting_download'"
            ))?;
            let rows = stmt.query_map([], row_to_entry)?;
            rows.collect()
        })
    }

    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM scheduled_search WHERE id = ?", params![id])?;
            Ok(n > 0)
        })
    }

    /// Push a scheduled entry's next run without claiming it (gated window,
    /// TBD start, allowlist skip). Does not bump the attempt counter.
    pub fn defer(
        &self,
        id: i64,
        next_run_at: DateTime<Utc>,
        note: Option<&str>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scheduled_search SET next_run_at = ?, last_error = ?
                 WHERE id = ? AND status = 'scheduled'",
                params![next_run_at.to_rfc3339(), note, id],
            )?;
            Ok(())
        })
    }

    /// Claim a scheduled entry for a run. Returns `false` when the entry is
    /// no longer claimable (already picked, paused, deleted).
    pub fn claim_for_run(
        &self,
        id: i64,
        dispatch_token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE scheduled_search
                 SET status = 'running', last_searched_at = ?, attempts = attempts + 1,
                     dispatch_token = ?
                 WHERE id = ? AND status = 'scheduled'",
                params![now.to_rfc3339(), dispatch_token, id],
            )?;
            Ok(n > 0)
        })
    }

    /// Finish a run by rescheduling. CAS on the dispatch token.
    pub fn finish_rescheduled(
        &self,
        id: i64,
        dispatch_token: &str,
        next_run_at: DateTime<Utc>,
        last_error: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE scheduled_search
                 SET status = 'scheduled', next_run_at = ?, last_error = ?, dispatch_token = NULL
                 WHERE id = ? AND dispatch_token = ?",
                params![next_run_at.to_rfc3339(), last_error, id, dispatch_token],
            )?;
            Ok(n > 0)
        })
    }

    /// Finish a run that sent a release. CAS on the dispatch token.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_waiting_download(
        &self,
        id: i64,
        dispatch_token: &str,
        chosen_nzb: &str,
        acquisition_id: &str,
        downloader_id: i64,
        safety_retry_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE scheduled_search
                 SET status = 'waiting_download', chosen_nzb = ?, acquisition_id = ?,
                     downloader_id = ?, next_run_at = ?, last_error = NULL,
                     dispatch_token = NULL
                 WHERE id = ? AND dispatch_token = ?",
                params![
                    chosen_nzb,
                    acquisition_id,
                    downloader_id,
                    safety_retry_at.to_rfc3339(),
                    id,
                    dispatch_token,
                ],
            )?;
            Ok(n > 0)
        })
    }

    /// Finish a run in terminal failure. CAS on the dispatch token.
    pub fn finish_failed(
        &self,
        id: i64,
        dispatch_token: &str,
        reason: &str,
    ) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE scheduled_search
                 SET status = 'failed', next_run_at = NULL, last_error = ?, dispatch_token = NULL
                 WHERE id = ? AND dispatch_token = ?",
                params![reason, id, dispatch_token],
            )?;
            Ok(n > 0)
        })
    }

    /// Terminal completion (download finished, or watch window expired).
    pub fn mark_completed(&self, id: i64, reason: Option<&str>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scheduled_search
                 SET status = 'completed', next_run_at = NULL, last_error = ?,
                     dispatch_token = NULL
                 WHERE id = ?",
                params![reason, id],
            )?;
            Ok(())
        })
    }

    /// WaitingDownload -> Scheduled after a failed download, with cooldown.
    pub fn return_to_scheduled(
        &self,
        id: i64,
        next_run_at: DateTime<Utc>,
        last_error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scheduled_search
                 SET status = 'scheduled', next_run_at = ?, last_error = ?,
                     attempts = attempts + 1, acquisition_id = NULL
                 WHERE id = ?",
                params![next_run_at.to_rfc3339(), last_error, id],
            )?;
            Ok(())
        })
    }

    pub fn pause(&self, id: i64) -> Result<WatchEntry, StoreError> {
        let entry = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("watch entry {id}")))?;
        if entry.status == WatchStatus::Paused {
            return Ok(entry);
        }
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scheduled_search
                 SET prior_status = status, status = 'paused', next_run_at = NULL
                 WHERE id = ?",
                params![id],
            )?;
            Ok(())
        })?;
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("watch entry {id}")))
    }

    /// Paused (or terminal, via operator restart) -> Scheduled, due now.
    pub fn resume(&self, id: i64, now: DateTime<Utc>) -> Result<WatchEntry, StoreError> {
        let entry = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("watch entry {id}")))?;
        match entry.status {
            WatchStatus::Paused | WatchStatus::Completed | WatchStatus::Failed => {}
            other => {
                return Err(StoreError::Conflict(format!(
                    "cannot resume entry in state {}",
                    other.as_str()
                )))
            }
        }
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scheduled_search
                 SET status = 'scheduled', prior_status = NULL, next_run_at = ?,
                     last_error = NULL
                 WHERE id = ?",
                params![now.to_rfc3339(), id],
            )?;
            Ok(())
        })?;
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("watch entry {id}")))
    }

    pub fn set_downloader(&self, id: i64, downloader_id: Option<i64>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE scheduled_search SET downloader_id = ? WHERE id = ?",
                params![downloader_id, id],
            )?;
            if n == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(())
        })
    }

    /// Make a scheduled entry due immediately (operator run-now).
    pub fn set_due_now(&self, id: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        let entry = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("watch entry {id}")))?;
        match entry.status {
            WatchStatus::Scheduled | WatchStatus::Failed => {}
            other => {
                return Err(StoreError::Conflict(format!(
                    "cannot run entry in state {}",
                    other.as_str()
                )))
            }
        }
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scheduled_search SET status = 'scheduled', next_run_at = ? WHERE id = ?",
                params![now.to_rfc3339(), id],
            )?;
            Ok(())
        })
    }
}

fn parse_dt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn row_to_entry(row: &Row) -> rusqlite::Result<WatchEntry> {
    let event_type_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let overrides_json: Option<String> = row.get(5)?;
    Ok(WatchEntry {
        id: row.get(0)?,
        round_id: row.get(1)?,
        event_type: EventType::parse(&event_type_str).unwrap_or(EventType::Other),
        status: WatchStatus::parse(&status_str).unwrap_or(WatchStatus::Paused),
        downloader_id: row.get(4)?,
        quality_overrides: overrides_json.and_then(|json| serde_json::from_str(&json).ok()),
        added_at: parse_dt(row.get(6)?).unwrap_or_else(Utc::now),
        last_searched_at: parse_dt(row.get(7)?),
        next_run_at: parse_dt(row.get(8)?),
        last_error: row.get(9)?,
        attempts: row.get(10)?,
        chosen_nzb: row.get(11)?,
        tag: row.get(12)?,
        dispatch_token: row.get(13)?,
        acquisition_id: row.get(14)?,
    })
}
