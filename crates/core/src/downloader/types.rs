//! Types for download client operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Downloader rejected credentials")]
    AuthRejected,

    #[error("Downloader unavailable: {0}")]
    Unavailable(String),

    #[error("Downloader rejected the job: {0}")]
    Rejected(String),

    #[error("Unknown category: {0}")]
    BadCategory(String),

    #[error("Downloader error: {0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::Unavailable(_) | DownloadError::Unknown(_)
        )
    }
}

/// Opaque identifier the downloader returned for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcquisitionId(pub String);

impl std::fmt::Display for AcquisitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a submitted job currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Unknown,
}

impl AcquisitionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcquisitionStatus::Completed | AcquisitionStatus::Failed)
    }
}

/// A job to hand to a downloader.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub nzb_url: String,
    pub title: String,
    pub category: Option<String>,
    pub priority: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DownloadError::Unavailable("down".to_string()).is_retryable());
        assert!(DownloadError::Unknown("?".to_string()).is_retryable());
        assert!(!DownloadError::AuthRejected.is_retryable());
        assert!(!DownloadError::Rejected("dup".to_string()).is_retryable());
        assert!(!DownloadError::BadCategory("f1".to_string()).is_retryable());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(AcquisitionStatus::Completed.is_terminal());
        assert!(AcquisitionStatus::Failed.is_terminal());
        assert!(!AcquisitionStatus::Downloading.is_terminal());
        assert!(!AcquisitionStatus::Queued.is_terminal());
        assert!(!AcquisitionStatus::Unknown.is_terminal());
    }
}
