//! SQLite-backed season/round/event store.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{Db, StoreError};

use super::{Event, EventType, Round, Season};

/// Fields accepted when upserting a round from the calendar importer.
#[derive(Debug, Clone)]
pub struct RoundUpsert {
    pub round_number: i32,
    pub name: String,
    pub circuit: Option<String>,
    pub country: Option<String>,
    pub circuit_tz: Option<String>,
}

pub struct SqliteCatalog {
    db: Db,
}

impl SqliteCatalog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn upsert_season(&self, year: i32) -> Result<Season, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO season (year) VALUES (?) ON CONFLICT(year) DO NOTHING",
                params![year],
            )?;
            conn.query_row(
                "SELECT id, year, last_refreshed, is_hidden FROM season WHERE year = ?",
                params![year],
                row_to_season,
            )
        })
    }

    pub fn get_season(&self, id: i64) -> Result<Option<Season>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, year, last_refreshed, is_hidden FROM season WHERE id = ?",
                params![id],
                row_to_season,
            )
            .optional()
        })
    }

    pub fn get_season_by_year(&self, year: i32) -> Result<Option<Season>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, year, last_refreshed, is_hidden FROM season WHERE year = ?",
                params![year],
                row_to_season,
            )
            .optional()
        })
    }

    /// List seasons, newest first. Hidden seasons are excluded unless asked for.
    pub fn list_seasons(&self, include_hidden: bool) -> Result<Vec<Season>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = if include_hidden {
                "SELECT id, year, last_refreshed, is_hidden FROM season ORDER BY year DESC"
            } else {
                "SELECT id, year, last_refreshed, is_hidden FROM season
                 WHERE is_hidden = 0 ORDER BY year DESC"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], row_to_season)?;
            rows.collect()
        })
    }

    pub fn touch_season_refreshed(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE season SET last_refreshed = ? WHERE id = ?",
                params![at.to_rfc3339(), id],
            )?;
            Ok(())
        })
    }

    /// Hide or unhide a season. Hiding force-pauses every watch entry under
    /// it; unhiding returns those entries to their pre-pause status with an
    /// immediate next run.
    pub fn set_season_hidden(
        &self,
        id: i64,
        hidden: bool,
        now: DateTime<Utc>,
    ) -> Result<Season, StoreError> {
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE season SET is_hidden = ? WHERE id = ?",
                params![hidden as i64, id],
            )?;
            if updated == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            if hidden {
                conn.execute(
                    "UPDATE scheduled_search
                     SET prior_status = status, status = 'paused', next_run_at = NULL
                     WHERE status != 'paused'
                       AND round_id IN (SELECT id FROM round WHERE season_id = ?)",
                    params![id],
                )?;
            } else {
                conn.execute(
                    "UPDATE scheduled_search
                     SET status = COALESCE(prior_status, 'scheduled'),
                         prior_status = NULL,
                         next_run_at = CASE
                             WHEN COALESCE(prior_status, 'scheduled') = 'scheduled' THEN ?
                             ELSE next_run_at
                         END
                     WHERE status = 'paused'
                       AND round_id IN (SELECT id FROM round WHERE season_id = ?)",
                    params![now.to_rfc3339(), id],
                )?;
            }
            conn.query_row(
                "SELECT id, year, last_refreshed, is_hidden FROM season WHERE id = ?",
                params![id],
                row_to_season,
            )
        })
    }

    /// Hard delete. Rounds, events, watch entries and cached searches go with
    /// it via foreign-key cascade.
    pub fn delete_season(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM season WHERE id = ?", params![id])?;
            Ok(n > 0)
        })
    }

    pub fn upsert_round(&self, season_id: i64, round: &RoundUpsert) -> Result<Round, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO round (season_id, round_number, name, circuit, country, circuit_tz)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(season_id, round_number) DO UPDATE SET
                     name = excluded.name,
                     circuit = COALESCE(excluded.circuit, round.circuit),
                     country = COALESCE(excluded.country, round.country),
                     circuit_tz = COALESCE(excluded.circuit_tz, round.circuit_tz)",
                params![
                    season_id,
                    round.round_number,
                    round.name,
                    round.circuit,
                    round.country,
                    round.circuit_tz,
                ],
            )?;
            conn.query_row(
                "SELECT id, season_id, round_number, name, circuit, country, circuit_tz
                 FROM round WHERE season_id = ? AND round_number = ?",
                params![season_id, round.round_number],
                row_to_round,
            )
        })
    }

    pub fn get_round(&self, id: i64) -> Result<Option<Round>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, season_id, round_number, name, circuit, country, circuit_tz
                 FROM round WHERE id = ?",
                params![id],
                row_to_round,
            )
            .optional()
        })
    }

    pub fn list_rounds(&self, season_id: i64) -> Result<Vec<Round>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, season_id, round_number, name, circuit, country, circuit_tz
                 FROM round WHERE season_id = ? ORDER BY round_number ASC",
            )?;
            let rows = stmt.query_map(params![season_id], row_to_round)?;
            rows.collect()
        })
    }

    pub fn upsert_event(
        &self,
        round_id: i64,
        event_type: EventType,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Event, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO event (round_id, type, start_time_utc, end_time_utc)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(round_id, type) DO UPDATE SET
                     start_time_utc = excluded.start_time_utc,
                     end_time_utc = excluded.end_time_utc",
                params![
                    round_id,
                    event_type.as_str(),
                    start.map(|t| t.to_rfc3339()),
                    end.map(|t| t.to_rfc3339()),
                ],
            )?;
            conn.query_row(
                "SELECT id, round_id, type, start_time_utc, end_time_utc
                 FROM event WHERE round_id = ? AND type = ?",
                params![round_id, event_type.as_str()],
                row_to_event,
            )
        })
    }

    pub fn delete_event(&self, round_id: i64, event_type: EventType) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM event WHERE round_id = ? AND type = ?",
                params![round_id, event_type.as_str()],
            )?;
            Ok(n > 0)
        })
    }

    pub fn get_event(
        &self,
        round_id: i64,
        event_type: EventType,
    ) -> Result<Option<Event>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, round_id, type, start_time_utc, end_time_utc
                 FROM event WHERE round_id = ? AND type = ?",
                params![round_id, event_type.as_str()],
                row_to_event,
            )
            .optional()
        })
    }

    pub fn list_events(&self, round_id: i64) -> Result<Vec<Event>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, round_id, type, start_time_utc, end_time_utc
                 FROM event WHERE round_id = ? ORDER BY start_time_utc ASC",
            )?;
            let rows = stmt.query_map(params![round_id], row_to_event)?;
            rows.collect()
        })
    }

    /// Whether the season owning this round is hidden.
    pub fn round_season_hidden(&self, round_id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT s.is_hidden FROM season s
                 JOIN round r ON r.season_id = s.id WHERE r.id = ?",
                params![round_id],
                |row| row.get::<_, i64>(0).map(|v| v != 0),
            )
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

fn row_to_season(row: &Row) -> rusqlite::Result<Season> {
    Ok(Season {
        id: row.get(0)?,
        year: row.get(1)?,
        last_refreshed: parse_dt(row.get(2)?),
        is_hidden: row.get::<_, i64>(3)? != 0,
    })
}

fn row_to_round(row: &Row) -> rusqlite::Result<Round> {
    Ok(Round {
        id: row.get(0)?,
        season_id: row.get(1)?,
        round_number: row.get(2)?,
        name: row.get(3)?,
        circuit: row.get(4)?,
        country: row.get(5)?,
        circuit_tz: row.get(6)?,
    })
}

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let type_str: String = row.get(2)?;
    Ok(Event {
        id: row.get(0)?,
        round_id: row.get(1)?,
        event_type: EventType::parse(&type_str).unwrap_or(EventType::Other),
        start_time_utc: parse_dt(row.get(3)?),
        end_time_utc: parse_dt(row.get(4)?),
    })
}
