//! Runtime settings: a single persisted row, read on boot and per search.
//!
//! Quality and cadence parameters are re-read at every use so operator edits
//! apply to the next search without a restart.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::catalog::EventType;
use crate::db::{Db, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Minimum acceptable vertical resolution.
    pub min_resolution: u32,
    /// Maximum acceptable vertical resolution.
    pub max_resolution: u32,
    pub allow_hdr: bool,
    pub preferred_codecs: Vec<String>,
    pub preferred_groups: Vec<String>,
    /// Auto-grab only fires at or above this score.
    pub auto_download_threshold: i32,
    pub default_downloader_id: Option<i64>,
    /// Session types eligible for scheduled searching. Empty = all.
    pub event_allowlist: Vec<EventType>,
    pub log_level: String,
    pub scheduler_tick_seconds: u64,
    /// Newznab maxage before the session starts.
    pub maxage_pre_days: u32,
    /// Newznab maxage once the session has run.
    pub maxage_post_days: u32,
    pub aggressive_window_h: i64,
    pub decay_interval_h: i64,
    pub stop_after_days: i64,
    pub jitter_seconds: i64,
    pub per_indexer_concurrency: usize,
    pub global_concurrency: usize,
    /// Operator-editable venue alias table, keyed by lowercased circuit or
    /// round name. Ships empty.
    pub venue_aliases: HashMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_resolution: 720,
            max_resolution: 1080,
            allow_hdr: true,
            preferred_codecs: vec!["x265".to_string(), "x264".to_string()],
            preferred_groups: Vec::new(),
            auto_download_threshold: 70,
            default_downloader_id: None,
            event_allowlist: Vec::new(),
            log_level: "info".to_string(),
            scheduler_tick_seconds: 600,
            maxage_pre_days: 14,
            maxage_post_days: 7,
            aggressive_window_h: 24,
            decay_interval_h: 6,
            stop_after_days: 14,
            jitter_seconds: 120,
            per_indexer_concurrency: 1,
            global_concurrency: 3,
            venue_aliases: HashMap::new(),
        }
    }
}

impl Settings {
    /// Whether this session type may be auto-searched.
    pub fn allows_event(&self, event_type: EventType) -> bool {
        self.event_allowlist.is_empty() || self.event_allowlist.contains(&event_type)
    }

    /// Allowed session types among the given set, in the given order.
    pub fn allowed_among(&self, types: &[EventType]) -> Vec<EventType> {
        types
            .iter()
            .copied()
            .filter(|t| self.allows_event(*t))
            .collect()
    }
}

pub struct SettingsStore {
    db: Db,
}

impl SettingsStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Load settings, falling back to defaults when the row does not exist
    /// or fails to parse (a forward-compat escape hatch for removed fields).
    pub fn load(&self) -> Result<Settings, StoreError> {
        let data: Option<String> = self.db.with_conn(|conn| {
            conn.query_row("SELECT data FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
        })?;
        Ok(data
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default())
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(settings).map_err(|e| StoreError::Database(e.to_string()))?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (id, data) VALUES (1, ?)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                params![json],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_row_returns_defaults() {
        let store = SettingsStore::new(Db::in_memory().unwrap());
        let settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.auto_download_threshold, 70);
        assert_eq!(settings.jitter_seconds, 120);
    }

    #[test]
    fn test_save_and_reload() {
        let store = SettingsStore::new(Db::in_memory().unwrap());
        let mut settings = Settings::default();
        settings.allow_hdr = false;
        settings.auto_download_threshold = 95;
        settings.event_allowlist = vec![EventType::Race, EventType::Qualifying];
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_empty_allowlist_allows_everything() {
        let settings = Settings::default();
        assert!(settings.allows_event(EventType::Fp1));
        assert!(settings.allows_event(EventType::Race));
    }

    #[test]
    fn test_allowlist_filters() {
        let settings = Settings {
            event_allowlist: vec![EventType::Race],
            ..Default::default()
        };
        assert!(settings.allows_event(EventType::Race));
        assert!(!settings.allows_event(EventType::Fp2));
        assert_eq!(
            settings.allowed_among(&[EventType::Fp2, EventType::Race]),
            vec![EventType::Race]
        );
    }

    #[test]
    fn test_corrupt_row_falls_back_to_defaults() {
        let db = Db::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (id, data) VALUES (1, 'not json')",
                [],
            )
        })
        .unwrap();
        let store = SettingsStore::new(db);
        assert_eq!(store.load().unwrap(), Settings::default());
    }
}
