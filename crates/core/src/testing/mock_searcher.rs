//! Mock release searcher for orchestration tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::registry::Indexer;
use crate::searcher::{
    EventSearchRequest, ReleaseCandidate, ReleaseSearcher, SearchError, SearchOutcome,
};

/// Scripted searcher: pops queued outcomes in order, then falls back to the
/// default outcome (empty unless set).
pub struct MockSearcher {
    queued: Mutex<Vec<Result<SearchOutcome, SearchError>>>,
    default_candidates: Mutex<Vec<ReleaseCandidate>>,
    requests: Mutex<Vec<EventSearchRequest>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(Vec::new()),
            default_candidates: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue one outcome; consumed in FIFO order.
    pub async fn push_outcome(&self, outcome: Result<SearchOutcome, SearchError>) {
        self.queued.lock().await.push(outcome);
    }

    /// Candidates returned once the queue is drained.
    pub async fn set_default_candidates(&self, candidates: Vec<ReleaseCandidate>) {
        *self.default_candidates.lock().await = candidates;
    }

    pub async fn requests(&self) -> Vec<EventSearchRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseSearcher for MockSearcher {
    async fn search_event(
        &self,
        _indexers: &[Indexer],
        request: &EventSearchRequest,
    ) -> Result<SearchOutcome, SearchError> {
        self.requests.lock().await.push(request.clone());

        let mut queued = self.queued.lock().await;
        if !queued.is_empty() {
            return queued.remove(0);
        }
        drop(queued);

        Ok(SearchOutcome {
            candidates: self.default_candidates.lock().await.clone(),
            indexer_errors: Default::default(),
            duration_ms: 1,
        })
    }
}
