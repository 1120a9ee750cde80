//! Types for the release search pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::catalog::{EventType, Round};
use crate::registry::Indexer;
use crate::settings::Settings;

/// Errors from indexer interaction.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Indexer rejected API key")]
    AuthRejected,

    #[error("Indexer rate limited")]
    RateLimited,

    #[error("Indexer unavailable: {0}")]
    Unavailable(String),

    #[error("Indexer rejected request: {0}")]
    BadRequest(String),

    #[error("Indexer response unparseable: {0}")]
    Parse(String),

    #[error("Request timeout")]
    Timeout,

    #[error("No enabled indexers")]
    NoEnabledIndexers,

    #[error("All indexers failed")]
    AllIndexersFailed(HashMap<String, String>),

    #[error(transparent)]
    Store(#[from] crate::db::StoreError),
}

impl SearchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::RateLimited | SearchError::Unavailable(_) | SearchError::Timeout
        )
    }
}

/// One query against one indexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexerQuery {
    /// `t=search`
    Text { q: String },
    /// `t=tvsearch&season={year}&ep={round}`
    Tv { q: String, season: i32, ep: i32 },
}

impl IndexerQuery {
    pub fn q(&self) -> &str {
        match self {
            IndexerQuery::Text { q } => q,
            IndexerQuery::Tv { q, .. } => q,
        }
    }
}

/// A raw item as returned by one indexer, before classification.
#[derive(Debug, Clone)]
pub struct RawRelease {
    pub title: String,
    pub nzb_url: String,
    pub indexer_id: i64,
    pub indexer_name: String,
    pub size_bytes: u64,
    pub pub_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

/// Session tag derived from a release title. Wider than [`EventType`]: titles
/// also advertise previews, notebooks and shakedowns, which are never
/// auto-grab targets for a session watch but do surface in manual searches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SessionTag {
    #[serde(rename = "FP1")]
    Fp1,
    #[serde(rename = "FP2")]
    Fp2,
    #[serde(rename = "FP3")]
    Fp3,
    Qualifying,
    Sprint,
    SprintQualifying,
    Race,
    Preview,
    Notebook,
    Shakedown,
    Other,
}

impl SessionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionTag::Fp1 => "FP1",
            SessionTag::Fp2 => "FP2",
            SessionTag::Fp3 => "FP3",
            SessionTag::Qualifying => "Qualifying",
            SessionTag::Sprint => "Sprint",
            SessionTag::SprintQualifying => "SprintQualifying",
            SessionTag::Race => "Race",
            SessionTag::Preview => "Preview",
            SessionTag::Notebook => "Notebook",
            SessionTag::Shakedown => "Shakedown",
            SessionTag::Other => "Other",
        }
    }

    /// The session tag a watch entry's event type corresponds to.
    pub fn from_event(event_type: EventType) -> SessionTag {
        match event_type {
            EventType::Fp1 => SessionTag::Fp1,
            EventType::Fp2 => SessionTag::Fp2,
            EventType::Fp3 => SessionTag::Fp3,
            EventType::Qualifying => SessionTag::Qualifying,
            EventType::Sprint => SessionTag::Sprint,
            EventType::SprintQualifying => SessionTag::SprintQualifying,
            EventType::Race => SessionTag::Race,
            EventType::Other => SessionTag::Other,
        }
    }

    /// Editorial content (previews, notebooks) rather than session footage.
    pub fn is_editorial(&self) -> bool {
        matches!(self, SessionTag::Preview | SessionTag::Notebook)
    }
}

/// What the classifier extracted from a title.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub year: Option<i32>,
    pub round: Option<i32>,
    pub session: Option<SessionTag>,
    /// Venue token captured from dotted release names, when present.
    pub venue: Option<String>,
    /// Vertical resolution (2160 for 4K/UHD).
    pub resolution: Option<u32>,
    pub codec: Option<String>,
    pub hdr: bool,
    pub group: Option<String>,
}

/// Merge key: identically-keyed releases are the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub year: Option<i32>,
    pub round: Option<i32>,
    pub session: Option<SessionTag>,
    pub venue: Option<String>,
    pub resolution: Option<u32>,
    pub codec: Option<String>,
    pub group: Option<String>,
    pub size_bucket: u64,
}

/// A classified, scored, merged search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    pub title: String,
    pub nzb_url: String,
    /// Every indexer that returned this release.
    pub indexers: Vec<String>,
    /// Indexer the kept `nzb_url` came from.
    pub indexer_id: i64,
    pub size_bytes: u64,
    pub pub_date: Option<DateTime<Utc>>,
    pub classification: Classification,
    pub score: i32,
    pub reasons: Vec<String>,
    /// Year or round contradicts the request; never auto-grabbed.
    pub hard_mismatch: bool,
}

/// Result of one event-level search across all enabled indexers.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<ReleaseCandidate>,
    /// Indexer name -> error message for partial failures.
    pub indexer_errors: HashMap<String, String>,
    pub duration_ms: u64,
}

/// One event-level search request.
#[derive(Debug, Clone)]
pub struct EventSearchRequest {
    pub year: i32,
    pub round: Round,
    pub event_type: EventType,
    pub settings: Settings,
    /// Session already ran (affects newznab maxage).
    pub session_started: bool,
}

/// Seam over the fan-out searcher so the scheduler is testable offline.
#[async_trait]
pub trait ReleaseSearcher: Send + Sync {
    async fn search_event(
        &self,
        indexers: &[Indexer],
        request: &EventSearchRequest,
    ) -> Result<SearchOutcome, SearchError>;
}
