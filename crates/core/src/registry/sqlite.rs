//! SQLite-backed CRUD for configured endpoints.

use rusqlite::{params, OptionalExtension, Row};

use crate::db::{Db, StoreError};

use super::{
    Downloader, DownloaderKind, Indexer, IndexerKind, NewDownloader, NewIndexer,
    NewNotificationTarget, NotificationTarget, NotifyEvent, TargetKind,
};

pub struct SqliteRegistry {
    db: Db,
}

impl SqliteRegistry {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    // --- indexers ---

    pub fn create_indexer(&self, new: NewIndexer) -> Result<Indexer, StoreError> {
        let category_ids =
            serde_json::to_string(&new.category_ids).map_err(|e| StoreError::Database(e.to_string()))?;
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO indexer (name, kind, base_url, api_key, category_ids, priority, enabled)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    new.name,
                    new.kind.as_str(),
                    new.base_url,
                    new.api_key,
                    category_ids,
                    new.priority,
                    new.enabled as i64,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get_indexer(id)?
            .ok_or_else(|| StoreError::NotFound(format!("indexer {id}")))
    }

    pub fn get_indexer(&self, id: i64) -> Result<Option<Indexer>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, kind, base_url, api_key, category_ids, priority, enabled, last_error
                 FROM indexer WHERE id = ?",
                params![id],
                row_to_indexer,
            )
            .optional()
        })
    }

    pub fn list_indexers(&self, enabled_only: bool) -> Result<Vec<Indexer>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = if enabled_only {
                "SELECT id, name, kind, base_url, api_key, category_ids, priority, enabled, last_error
                 FROM indexer WHERE enabled = 1 ORDER BY priority DESC, name ASC"
            } else {
                "SELECT id, name, kind, base_url, api_key, category_ids, priority, enabled, last_error
                 FROM indexer ORDER BY priority DESC, name ASC"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], row_to_indexer)?;
            rows.collect()
        })
    }

    pub fn update_indexer(&self, id: i64, new: NewIndexer) -> Result<Indexer, StoreError> {
        let category_ids =
            serde_json::to_string(&new.category_ids).map_err(|e| StoreError::Database(e.to_string()))?;
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE indexer SET name = ?, kind = ?, base_url = ?, api_key = ?,
                     category_ids = ?, priority = ?, enabled = ?
                 WHERE id = ?",
                params![
                    new.name,
                    new.kind.as_str(),
                    new.base_url,
                    new.api_key,
                    category_ids,
                    new.priority,
                    new.enabled as i64,
                    id,
                ],
            )
        })?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("indexer {id}")));
        }
        self.get_indexer(id)?
            .ok_or_else(|| StoreError::NotFound(format!("indexer {id}")))
    }

    pub fn set_indexer_error(&self, id: i64, error: Option<&str>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE indexer SET last_error = ? WHERE id = ?",
                params![error, id],
            )?;
            Ok(())
        })
    }

    pub fn delete_indexer(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM indexer WHERE id = ?", params![id])?;
            Ok(n > 0)
        })
    }

    // --- downloaders ---

    pub fn create_downloader(&self, new: NewDownloader) -> Result<Downloader, StoreError> {
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO downloader (name, kind, base_url, api_key, category, priority, enabled)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    new.name,
                    new.kind.as_str(),
                    new.base_url,
                    new.api_key,
                    new.category,
                    new.priority,
                    new.enabled as i64,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get_downloader(id)?
            .ok_or_else(|| StoreError::NotFound(format!("downloader {id}")))
    }

    pub fn get_downloader(&self, id: i64) -> Result<Option<Downloader>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, kind, base_url, api_key, category, priority, enabled, last_error
                 FROM downloader WHERE id = ?",
                params![id],
                row_to_downloader,
            )
            .optional()
        })
    }

    pub fn list_downloaders(&self, enabled_only: bool) -> Result<Vec<Downloader>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = if enabled_only {
                "SELECT id, name, kind, base_url, api_key, category, priority, enabled, last_error
                 FROM downloader WHERE enabled = 1 ORDER BY id ASC"
            } else {
                "SELECT id, name, kind, base_url, api_key, category, priority, enabled, last_error
                 FROM downloader ORDER BY id ASC"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], row_to_downloader)?;
            rows.collect()
        })
    }

    pub fn update_downloader(&self, id: i64, new: NewDownloader) -> Result<Downloader, StoreError> {
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE downloader SET name = ?, kind = ?, base_url = ?, api_key = ?,
                     category = ?, priority = ?, enabled = ?
                 WHERE id = ?",
                params![
                    new.name,
                    new.kind.as_str(),
                    new.base_url,
                    new.api_key,
                    new.category,
                    new.priority,
                    new.enabled as i64,
                    id,
                ],
            )
        })?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("downloader {id}")));
        }
        self.get_downloader(id)?
            .ok_or_else(|| StoreError::NotFound(format!("downloader {id}")))
    }

    pub fn set_downloader_error(&self, id: i64, error: Option<&str>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE downloader SET last_error = ? WHERE id = ?",
                params![error, id],
            )?;
            Ok(())
        })
    }

    pub fn delete_downloader(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM downloader WHERE id = ?", params![id])?;
            Ok(n > 0)
        })
    }

    // --- notification targets ---

    pub fn create_target(
        &self,
        new: NewNotificationTarget,
    ) -> Result<NotificationTarget, StoreError> {
        let mask =
            serde_json::to_string(&new.event_mask).map_err(|e| StoreError::Database(e.to_string()))?;
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_target (kind, name, url, event_mask, webhook_secret)
                 VALUES (?, ?, ?, ?, ?)",
                params![new.kind.as_str(), new.name, new.url, mask, new.webhook_secret],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get_target(id)?
            .ok_or_else(|| StoreError::NotFound(format!("notification target {id}")))
    }

    pub fn get_target(&self, id: i64) -> Result<Option<NotificationTarget>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, kind, name, url, event_mask, webhook_secret
                 FROM notification_target WHERE id = ?",
                params![id],
                row_to_target,
            )
            .optional()
        })
    }

    pub fn list_targets(&self) -> Result<Vec<NotificationTarget>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, name, url, event_mask, webhook_secret
                 FROM notification_target ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], row_to_target)?;
            rows.collect()
        })
    }

    pub fn update_target(
        &self,
        id: i64,
        new: NewNotificationTarget,
    ) -> Result<NotificationTarget, StoreError> {
        let mask =
            serde_json::to_string(&new.event_mask).map_err(|e| StoreError::Database(e.to_string()))?;
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE notification_target SET kind = ?, name = ?, url = ?, event_mask = ?,
                     webhook_secret = ?
                 WHERE id = ?",
                params![new.kind.as_str(), new.name, new.url, mask, new.webhook_secret, id],
            )
        })?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("notification target {id}")));
        }
        self.get_target(id)?
            .ok_or_else(|| StoreError::NotFound(format!("notification target {id}")))
    }

    pub fn delete_target(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM notification_target WHERE id = ?",
                params![id],
            )?;
            Ok(n > 0)
        })
    }
}

fn row_to_indexer(row: &Row) -> rusqlite::Result<Indexer> {
    let kind_str: String = row.get(2)?;
    let cats_json: String = row.get(5)?;
    Ok(Indexer {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: IndexerKind::parse(&kind_str).unwrap_or(IndexerKind::Custom),
        base_url: row.get(3)?,
        api_key: row.get(4)?,
        category_ids: serde_json::from_str(&cats_json).unwrap_or_default(),
        priority: row.get(6)?,
        enabled: row.get::<_, i64>(7)? != 0,
        last_error: row.get(8)?,
    })
}

fn row_to_downloader(row: &Row) -> rusqlite::Result<Downloader> {
    let kind_str: String = row.get(2)?;
    Ok(Downloader {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: DownloaderKind::parse(&kind_str).unwrap_or(DownloaderKind::Sabnzbd),
        base_url: row.get(3)?,
        api_key: row.get(4)?,
        category: row.get(5)?,
        priority: row.get(6)?,
        enabled: row.get::<_, i64>(7)? != 0,
        last_error: row.get(8)?,
    })
}

fn row_to_target(row: &Row) -> rusqlite::Result<NotificationTarget> {
    let kind_str: String = row.get(1)?;
    let mask_json: String = row.get(4)?;
    let event_mask: Vec<NotifyEvent> = serde_json::from_str(&mask_json).unwrap_or_default();
    Ok(NotificationTarget {
        id: row.get(0)?,
        kind: TargetKind::parse(&kind_str).unwrap_or(TargetKind::Webhook),
        name: row.get(2)?,
        url: row.get(3)?,
        event_mask,
        webhook_secret: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SqliteRegistry {
        SqliteRegistry::new(Db::in_memory().unwrap())
    }

    fn new_indexer(name: &str) -> NewIndexer {
        NewIndexer {
            name: name.to_string(),
            kind: IndexerKind::Newznab,
            base_url: "https://indexer.example".to_string(),
            api_key: Some("key123".to_string()),
            category_ids: vec![5070, 5080],
            priority: 10,
            enabled: true,
        }
    }

    #[test]
    fn test_indexer_crud() {
        let registry = registry();
        let created = registry.create_indexer(new_indexer("nzbfinder")).unwrap();
        assert_eq!(created.category_ids, vec![5070, 5080]);

        let mut update = new_indexer("nzbfinder");
        update.enabled = false;
        let updated = registry.update_indexer(created.id, update).unwrap();
        assert!(!updated.enabled);

        assert!(registry.list_indexers(true).unwrap().is_empty());
        assert_eq!(registry.list_indexers(false).unwrap().len(), 1);

        assert!(registry.delete_indexer(created.id).unwrap());
        assert!(registry.get_indexer(created.id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_indexer_is_not_found() {
        let registry = registry();
        let result = registry.update_indexer(99, new_indexer("ghost"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_downloader_crud_and_error_tracking() {
        let registry = registry();
        let created = registry
            .create_downloader(NewDownloader {
                name: "sab".to_string(),
                kind: DownloaderKind::Sabnzbd,
                base_url: "http://sab:8080".to_string(),
                api_key: Some("sabkey".to_string()),
                category: Some("f1".to_string()),
                priority: 0,
                enabled: true,
            })
            .unwrap();

        registry
            .set_downloader_error(created.id, Some("connection refused"))
            .unwrap();
        let reloaded = registry.get_downloader(created.id).unwrap().unwrap();
        assert_eq!(reloaded.last_error.as_deref(), Some("connection refused"));

        registry.set_downloader_error(created.id, None).unwrap();
        let cleared = registry.get_downloader(created.id).unwrap().unwrap();
        assert!(cleared.last_error.is_none());
    }

    #[test]
    fn test_target_mask_roundtrip() {
        let registry = registry();
        let created = registry
            .create_target(NewNotificationTarget {
                kind: TargetKind::Webhook,
                name: "ops hook".to_string(),
                url: "https://hooks.example/x".to_string(),
                event_mask: vec![NotifyEvent::DownloadComplete, NotifyEvent::DownloadFail],
                webhook_secret: Some("whsec".to_string()),
            })
            .unwrap();

        let loaded = registry.get_target(created.id).unwrap().unwrap();
        assert_eq!(loaded.event_mask.len(), 2);
        assert!(loaded.event_mask.contains(&NotifyEvent::DownloadComplete));
        assert_eq!(loaded.webhook_secret.as_deref(), Some("whsec"));
    }
}
