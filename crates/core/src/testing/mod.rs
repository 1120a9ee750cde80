//! Mock implementations and fixtures for integration tests.

mod mock_downloader;
mod mock_notifier;
mod mock_searcher;

pub use mock_downloader::MockDownloadClient;
pub use mock_notifier::MockNotifier;
pub use mock_searcher::MockSearcher;

pub mod fixtures {
    use crate::searcher::{classifier, Classification, ReleaseCandidate};

    /// A candidate as the scorer would emit it, classification included.
    pub fn candidate(title: &str, score: i32) -> ReleaseCandidate {
        let classification: Classification = classifier::classify(title);
        let hard_mismatch = false;
        ReleaseCandidate {
            title: title.to_string(),
            nzb_url: format!("https://indexer.example/get/{}", title.len()),
            indexers: vec!["mock-indexer".to_string()],
            indexer_id: 1,
            size_bytes: 2_000_000_000,
            pub_date: None,
            classification,
            score,
            reasons: vec![format!("fixture score {score}")],
            hard_mismatch,
        }
    }

    /// Same, flagged as a hard year/round mismatch.
    pub fn mismatched_candidate(title: &str, score: i32) -> ReleaseCandidate {
        let mut candidate = candidate(title, score);
        candidate.hard_mismatch = true;
        candidate
    }
}
