//! Shared SQLite handle.
//!
//! One connection behind a mutex: every write serializes on the lock, which
//! is the single-writer discipline the embedded engine wants. Domain stores
//! (`catalog`, `registry`, `watch`, ...) hold clones of [`Db`] and run their
//! statements through [`Db::with_conn`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("row".to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Cloneable handle to the single embedded database.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure with the connection locked. All reads and writes go
    /// through here; the mutex is the writer serialization point.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        f(&conn).map_err(StoreError::from)
    }

    /// Readiness probe: a trivial query against the live connection.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
    }
}

fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS season (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            year INTEGER NOT NULL UNIQUE,
            last_refreshed TEXT,
            is_hidden INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_season_year ON season(year);

        CREATE TABLE IF NOT EXISTS round (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            season_id INTEGER NOT NULL REFERENCES season(id) ON DELETE CASCADE,
            round_number INTEGER NOT NULL,
            name TEXT NOT NULL,
            circuit TEXT,
            country TEXT,
            circuit_tz TEXT,
            UNIQUE(season_id, round_number)
        );
        CREATE INDEX IF NOT EXISTS idx_round_season ON round(season_id, round_number);

        CREATE TABLE IF NOT EXISTS event (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            round_id INTEGER NOT NULL REFERENCES round(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            start_time_utc TEXT,
            end_time_utc TEXT,
            UNIQUE(round_id, type)
        );
        CREATE INDEX IF NOT EXISTS idx_event_round_type ON event(round_id, type);

        CREATE TABLE IF NOT EXISTS indexer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            base_url TEXT NOT NULL,
            api_key TEXT,
            category_ids TEXT NOT NULL DEFAULT '[]',
            priority INTEGER NOT NULL DEFAULT 0,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_error TEXT
        );

        CREATE TABLE IF NOT EXISTS downloader (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            base_url TEXT NOT NULL,
            api_key TEXT,
            category TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_error TEXT
        );

        CREATE TABLE IF NOT EXISTS notification_target (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            event_mask TEXT NOT NULL DEFAULT '[]',
            webhook_secret TEXT
        );

        CREATE TABLE IF NOT EXISTS scheduled_search (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            round_id INTEGER NOT NULL REFERENCES round(id) ON DELETE CASCADE,
            event_type TEXT NOT NULL,
            status TEXT NOT NULL,
            prior_status TEXT,
            downloader_id INTEGER,
            quality_overrides TEXT,
            added_at TEXT NOT NULL,
            last_searched_at TEXT,
            next_run_at TEXT,
            last_error TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            chosen_nzb TEXT,
            tag TEXT,
            dispatch_token TEXT,
            acquisition_id TEXT,
            UNIQUE(round_id, event_type)
        );
        CREATE INDEX IF NOT EXISTS idx_scheduled_search_due
            ON scheduled_search(status, next_run_at);

        CREATE TABLE IF NOT EXISTS download_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            indexer_id INTEGER,
            downloader_id INTEGER NOT NULL,
            nzb_title TEXT NOT NULL,
            nzb_url TEXT NOT NULL,
            score INTEGER NOT NULL,
            status TEXT NOT NULL,
            last_polled_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_download_history_event
            ON download_history(event_id);

        CREATE TABLE IF NOT EXISTS cached_round_search (
            round_id INTEGER NOT NULL REFERENCES round(id) ON DELETE CASCADE,
            allowlist_fingerprint TEXT NOT NULL,
            created_at TEXT NOT NULL,
            ttl_hours INTEGER NOT NULL,
            results_json TEXT NOT NULL,
            PRIMARY KEY (round_id, allowlist_fingerprint)
        );

        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            data TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| StoreError::Database(e.to_string()))?;

    // Migration: circuit_tz arrived after the first release.
    let _ = conn.execute("ALTER TABLE round ADD COLUMN circuit_tz TEXT", []);
    // Migration: dispatch guard columns.
    let _ = conn.execute("ALTER TABLE scheduled_search ADD COLUMN dispatch_token TEXT", []);
    let _ = conn.execute("ALTER TABLE scheduled_search ADD COLUMN acquisition_id TEXT", []);

    Ok(())
}
