//! Concurrency caps for indexer traffic.
//!
//! A global semaphore bounds total in-flight indexer calls; a per-indexer
//! semaphore (default 1 permit) serializes calls to any single endpoint.
//! Waiters queue FIFO inside tokio's semaphore.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

pub struct SearchLimits {
    global: Arc<Semaphore>,
    per_indexer_permits: usize,
    per_indexer: Mutex<HashMap<i64, Arc<Semaphore>>>,
}

/// Both permits for one indexer call. Dropping releases them.
pub struct SearchPermit {
    _global: OwnedSemaphorePermit,
    _indexer: OwnedSemaphorePermit,
}

impl SearchLimits {
    pub fn new(global_concurrency: usize, per_indexer_concurrency: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_concurrency.max(1))),
            per_indexer_permits: per_indexer_concurrency.max(1),
            per_indexer: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for a slot on both the global pool and the indexer's own lane.
    pub async fn acquire(&self, indexer_id: i64) -> SearchPermit {
        let indexer_sem = {
            let mut map = self.per_indexer.lock().await;
            Arc::clone(
                map.entry(indexer_id)
                    .or_insert_with(|| Arc::new(Semaphore::new(self.per_indexer_permits))),
            )
        };
        // Indexer lane first so a busy indexer doesn't pin a global slot.
        let indexer = indexer_sem
            .acquire_owned()
            .await
            .expect("semaphore closed");
        let global = Arc::clone(&self.global)
            .acquire_owned()
            .await
            .expect("semaphore closed");
        SearchPermit {
            _global: global,
            _indexer: indexer,
        }
    }
}
