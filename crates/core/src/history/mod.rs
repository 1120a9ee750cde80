//! Append-only record of acquisition attempts.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{Db, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Sent,
    Downloading,
    Completed,
    Failed,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Sent => "sent",
            HistoryStatus::Downloading => "downloading",
            HistoryStatus::Completed => "completed",
            HistoryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(HistoryStatus::Sent),
            "downloading" => Some(HistoryStatus::Downloading),
            "completed" => Some(HistoryStatus::Completed),
            "failed" => Some(HistoryStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub event_id: i64,
    pub indexer_id: Option<i64>,
    pub downloader_id: i64,
    pub nzb_title: String,
    pub nzb_url: String,
    pub score: i32,
    pub status: HistoryStatus,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub event_id: i64,
    pub indexer_id: Option<i64>,
    pub downloader_id: i64,
    pub nzb_title: String,
    pub nzb_url: String,
    pub score: i32,
}

pub struct HistoryStore {
    db: Db,
}

impl HistoryStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// One row per acquisition attempt, created in `Sent` state.
    pub fn append(
        &self,
        new: NewHistoryEntry,
        now: DateTime<Utc>,
    ) -> Result<HistoryEntry, StoreError> {
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO download_history
                     (event_id, indexer_id, downloader_id, nzb_title, nzb_url, score,
                      status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, 'sent', ?, ?)",
                params![
                    new.event_id,
                    new.indexer_id,
                    new.downloader_id,
                    new.nzb_title,
                    new.nzb_url,
                    new.score,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("history entry {id}")))
    }

    pub fn get(&self, id: i64) -> Result<Option<HistoryEntry>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, event_id, indexer_id, downloader_id, nzb_title, nzb_url, score,
                        status, last_polled_at, created_at, updated_at
                 FROM download_history WHERE id = ?",
                params![id],
                row_to_entry,
            )
            .optional()
        })
    }

    pub fn update_status(
        &self,
        id: i64,
        status: HistoryStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE download_history
                 SET status = ?, last_polled_at = ?, updated_at = ?
                 WHERE id = ?",
                params![status.as_str(), now.to_rfc3339(), now.to_rfc3339(), id],
            )?;
            Ok(())
        })
    }

    /// Most recent attempt for an event, used by the download poller.
    pub fn latest_for_event(&self, event_id: i64) -> Result<Option<HistoryEntry>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, event_id, indexer_id, downloader_id, nzb_title, nzb_url, score,
                        status, last_polled_at, created_at, updated_at
                 FROM download_history WHERE event_id = ?
                 ORDER BY id DESC LIMIT 1",
                params![event_id],
                row_to_entry,
            )
            .optional()
        })
    }

    pub fn list_for_event(&self, event_id: i64) -> Result<Vec<HistoryEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_id, indexer_id, downloader_id, nzb_title, nzb_url, score,
                        status, last_polled_at, created_at, updated_at
                 FROM download_history WHERE event_id = ? ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![event_id], row_to_entry)?;
            rows.collect()
        })
    }

    pub fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_id, indexer_id, downloader_id, nzb_title, nzb_url, score,
                        status, last_polled_at, created_at, updated_at
                 FROM download_history ORDER BY created_at DESC LIMIT ?",
            )?;
            let rows = stmt.query_map(params![limit], row_to_entry)?;
            rows.collect()
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

fn row_to_entry(row: &Row) -> rusqlite::Result<HistoryEntry> {
    let status_str: String = row.get(7)?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        event_id: row.get(1)?,
        indexer_id: row.get(2)?,
        downloader_id: row.get(3)?,
        nzb_title: row.get(4)?,
        nzb_url: row.get(5)?,
        score: row.get(6)?,
        status: HistoryStatus::parse(&status_str).unwrap_or(HistoryStatus::Sent),
        last_polled_at: parse_dt(row.get(8)?),
        created_at: parse_dt(row.get(9)?).unwrap_or_else(Utc::now),
        updated_at: parse_dt(row.get(10)?).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HistoryStore {
        HistoryStore::new(Db::in_memory().unwrap())
    }

    fn entry(event_id: i64) -> NewHistoryEntry {
        NewHistoryEntry {
            event_id,
            indexer_id: Some(1),
            downloader_id: 1,
            nzb_title: "Formula.1.2025.Round03.Bahrain.Qualifying.1080p.x265-NTb".to_string(),
            nzb_url: "https://indexer.example/get/abc".to_string(),
            score: 130,
        }
    }

    #[test]
    fn test_append_starts_sent() {
        let store = store();
        let row = store.append(entry(5), Utc::now()).unwrap();
        assert_eq!(row.status, HistoryStatus::Sent);
        assert_eq!(row.event_id, 5);
        assert!(row.last_polled_at.is_none());
    }

    #[test]
    fn test_update_status_stamps_poll_time() {
        let store = store();
        let row = store.append(entry(5), Utc::now()).unwrap();
        let polled = Utc::now();
        store
            .update_status(row.id, HistoryStatus::Completed, polled)
            .unwrap();

        let reloaded = store.get(row.id).unwrap().unwrap();
        assert_eq!(reloaded.status, HistoryStatus::Completed);
        assert!(reloaded.last_polled_at.is_some());
    }

    #[test]
    fn test_multiple_attempts_per_event_are_kept() {
        let store = store();
        store.append(entry(5), Utc::now()).unwrap();
        store.append(entry(5), Utc::now()).unwrap();
        assert_eq!(store.list_for_event(5).unwrap().len(), 2);
    }

    #[test]
    fn test_list_recent_respects_limit() {
        let store = store();
        for i in 0..5 {
            store.append(entry(i), Utc::now()).unwrap();
        }
        assert_eq!(store.list_recent(3).unwrap().len(), 3);
    }
}
