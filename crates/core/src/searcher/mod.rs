//! Release search: query fan-out, classification, scoring, merging.

pub mod classifier;
mod limits;
mod newznab;
pub mod queries;
pub mod scorer;
mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::registry::Indexer;

pub use limits::{SearchLimits, SearchPermit};
pub use newznab::NewznabClient;
pub use types::*;

use classifier::{canonical_key, classify};
use queries::{build_queries, VenueAliases};
use scorer::{compare_candidates, score, ScoreContext};

const LIMIT_PER_QUERY: u32 = 50;

/// Concrete fan-out searcher over Newznab indexers.
pub struct EventSearcher {
    client: NewznabClient,
    limits: Arc<SearchLimits>,
}

impl EventSearcher {
    pub fn new(limits: Arc<SearchLimits>) -> Self {
        Self {
            client: NewznabClient::new(),
            limits,
        }
    }

}

#[async_trait]
impl ReleaseSearcher for EventSearcher {
    async fn search_event(
        &self,
        indexers: &[Indexer],
        request: &EventSearchRequest,
    ) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        let enabled: Vec<&Indexer> = indexers.iter().filter(|i| i.enabled).collect();
        if enabled.is_empty() {
            return Err(SearchError::NoEnabledIndexers);
        }

        let queries = build_queries(
            request.year,
            &request.round,
            request.event_type,
            &request.settings,
        );
        let maxage_days = if request.session_started {
            request.settings.maxage_post_days
        } else {
            request.settings.maxage_pre_days
        };

        debug!(
            round = %request.round.name,
            event = %request.event_type,
            indexers = enabled.len(),
            queries = queries.len(),
            "Starting search fan-out"
        );

        let calls = enabled.iter().flat_map(|indexer| {
            queries.iter().map(move |query| {
                let limits = Arc::clone(&self.limits);
                async move {
                    let _permit = limits.acquire(indexer.id).await;
                    let result = self
                        .client
                        .search(indexer, query, maxage_days, LIMIT_PER_QUERY)
                        .await;
                    (indexer.name.clone(), result)
                }
            })
        });
        let results = futures::future::join_all(calls).await;

        let mut raw: Vec<RawRelease> = Vec::new();
        let mut failures: HashMap<String, String> = HashMap::new();
        let mut succeeded: HashMap<String, bool> = HashMap::new();
        for (indexer_name, result) in results {
            match result {
                Ok(mut items) => {
                    raw.append(&mut items);
                    succeeded.insert(indexer_name, true);
                }
                Err(e) => {
                    warn!(indexer = %indexer_name, error = %e, "Indexer query failed");
                    failures.insert(indexer_name.clone(), e.to_string());
                    succeeded.entry(indexer_name).or_insert(false);
                }
            }
        }

        // An indexer counts as failed only when every one of its queries did.
        let indexer_errors: HashMap<String, String> = failures
            .into_iter()
            .filter(|(name, _)| !succeeded.get(name).copied().unwrap_or(false))
            .collect();

        if raw.is_empty() && indexer_errors.len() == enabled.len() {
            return Err(SearchError::AllIndexersFailed(indexer_errors));
        }

        let candidates = merge_and_score(raw, request);

        Ok(SearchOutcome {
            candidates,
            indexer_errors,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Classify, score, merge by canonical key, and sort.
///
/// Identical canonical keys collapse to one candidate: the highest-scoring
/// copy survives and the source indexer list is the union.
pub fn merge_and_score(raw: Vec<RawRelease>, request: &EventSearchRequest) -> Vec<ReleaseCandidate> {
    let venues = VenueAliases::for_round(&request.round, &request.settings);
    let ctx = ScoreContext {
        year: request.year,
        round_number: request.round.round_number,
        requested: request.event_type,
        venues: &venues,
        settings: &request.settings,
    };

    let mut by_key: HashMap<CanonicalKey, ReleaseCandidate> = HashMap::new();
    for release in raw {
        let classification = classify(&release.title);
        let scored = score(&release.title, &classification, &ctx);
        let key = canonical_key(&classification, release.size_bytes);

        match by_key.get_mut(&key) {
            Some(existing) => {
                if !existing.indexers.contains(&release.indexer_name) {
                    existing.indexers.push(release.indexer_name.clone());
                }
                if scored.value > existing.score {
                    existing.title = release.title;
                    existing.nzb_url = release.nzb_url;
                    existing.indexer_id = release.indexer_id;
                    existing.size_bytes = release.size_bytes;
                    existing.pub_date = existing.pub_date.max(release.pub_date);
                    existing.classification = classification;
                    existing.score = scored.value;
                    existing.reasons = scored.reasons;
                    existing.hard_mismatch = scored.hard_mismatch;
                }
            }
            None => {
                by_key.insert(
                    key,
                    ReleaseCandidate {
                        title: release.title,
                        nzb_url: release.nzb_url,
                        indexers: vec![release.indexer_name],
                        indexer_id: release.indexer_id,
                        size_bytes: release.size_bytes,
                        pub_date: release.pub_date,
                        classification,
                        score: scored.value,
                        reasons: scored.reasons,
                        hard_mismatch: scored.hard_mismatch,
                    },
                );
            }
        }
    }

    let mut candidates: Vec<ReleaseCandidate> = by_key.into_values().collect();
    let median = median_size(&candidates);
    candidates.sort_by(|a, b| compare_candidates(a, b, &request.settings, median));
    candidates
}

fn median_size(candidates: &[ReleaseCandidate]) -> u64 {
    if candidates.is_empty() {
        return 0;
    }
    let mut sizes: Vec<u64> = candidates.iter().map(|c| c.size_bytes).collect();
    sizes.sort_unstable();
    sizes[sizes.len() / 2]
}

/// Best auto-grab candidate: highest-sorted entry above the threshold with
/// no hard mismatch.
pub fn pick_best(candidates: &[ReleaseCandidate], threshold: i32) -> Option<&ReleaseCandidate> {
    candidates
        .iter()
        .find(|c| !c.hard_mismatch && c.score >= threshold)
}
