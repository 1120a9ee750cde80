//! Round-level search cache.
//!
//! Keyed by `(round_id, allowlist fingerprint)` so a settings change to the
//! allowed session types never serves a stale mix. TTL is enforced on read;
//! stale rows are dropped in place, no background sweep.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use crate::catalog::EventType;
use crate::db::{Db, StoreError};
use crate::searcher::ReleaseCandidate;

pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Canonical fingerprint of an allowed session-type set: sorted, lowercased,
/// comma-joined. Order-independent by construction.
pub fn fingerprint(allowlist: &[EventType]) -> String {
    let mut names: Vec<String> = allowlist
        .iter()
        .map(|t| t.as_str().to_lowercase())
        .collect();
    names.sort();
    names.dedup();
    names.join(",")
}

/// A cache hit.
#[derive(Debug, Clone)]
pub struct CachedRoundSearch {
    pub results: Vec<ReleaseCandidate>,
    pub cached_at: DateTime<Utc>,
    pub ttl_hours: i64,
}

pub struct SearchCache {
    db: Db,
}

impl SearchCache {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Fresh entry or `None`. Expired rows are deleted on the way out; a miss
    /// is never an error.
    pub fn read(
        &self,
        round_id: i64,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedRoundSearch>, StoreError> {
        let row: Option<(String, i64, String)> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT created_at, ttl_hours, results_json FROM cached_round_search
                 WHERE round_id = ? AND allowlist_fingerprint = ?",
                params![round_id, fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
        })?;

        let Some((created_at_str, ttl_hours, results_json)) = row else {
            return Ok(None);
        };
        let Some(cached_at) = DateTime::parse_from_rfc3339(&created_at_str)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
        else {
            self.evict(round_id, fingerprint)?;
            return Ok(None);
        };

        if now - cached_at >= Duration::hours(ttl_hours) {
            self.evict(round_id, fingerprint)?;
            return Ok(None);
        }

        let results = match serde_json::from_str(&results_json) {
            Ok(results) => results,
            Err(_) => {
                self.evict(round_id, fingerprint)?;
                return Ok(None);
            }
        };

        Ok(Some(CachedRoundSearch {
            results,
            cached_at,
            ttl_hours,
        }))
    }

    /// Replace the cached value atomically.
    pub fn write(
        &self,
        round_id: i64,
        fingerprint: &str,
        results: &[ReleaseCandidate],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(results).map_err(|e| StoreError::Database(e.to_string()))?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cached_round_search
                     (round_id, allowlist_fingerprint, created_at, ttl_hours, results_json)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(round_id, allowlist_fingerprint) DO UPDATE SET
                     created_at = excluded.created_at,
                     ttl_hours = excluded.ttl_hours,
                     results_json = excluded.results_json",
                params![round_id, fingerprint, now.to_rfc3339(), DEFAULT_TTL_HOURS, json],
            )?;
            Ok(())
        })
    }

    fn evict(&self, round_id: i64, fingerprint: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM cached_round_search
                 WHERE round_id = ? AND allowlist_fingerprint = ?",
                params![round_id, fingerprint],
            )?;
            Ok(())
        })
    }
}
