//! Watch entries: one per (round, session) the operator wants acquired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::EventType;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Scheduled,
    Running,
    WaitingDownload,
    Completed,
    Failed,
    Paused,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Scheduled => "scheduled",
            WatchStatus::Running => "running",
            WatchStatus::WaitingDownload => "waiting_download",
            WatchStatus::Completed => "completed",
            WatchStatus::Failed => "failed",
            WatchStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(WatchStatus::Scheduled),
            "running" => Some(WatchStatus::Running),
            "waiting_download" => Some(WatchStatus::WaitingDownload),
            "completed" => Some(WatchStatus::Completed),
            "failed" => Some(WatchStatus::Failed),
            "paused" => Some(WatchStatus::Paused),
            _ => None,
        }
    }

    /// Completed entries are immutable to the tick; only operator delete or
    /// resume touches them again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchStatus::Completed)
    }
}

/// Per-entry overrides layered over the global quality settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_resolution: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resolution: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_hdr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_codecs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_groups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_download_threshold: Option<i32>,
}

impl QualityOverrides {
    /// Settings with these overrides applied.
    pub fn apply(&self, base: &Settings) -> Settings {
        let mut settings = base.clone();
        if let Some(v) = self.min_resolution {
            settings.min_resolution = v;
        }
        if let Some(v) = self.max_resolution {
            settings.max_resolution = v;
        }
        if let Some(v) = self.allow_hdr {
            settings.allow_hdr = v;
        }
        if let Some(v) = &self.preferred_codecs {
            settings.preferred_codecs = v.clone();
        }
        if let Some(v) = &self.preferred_groups {
            settings.preferred_groups = v.clone();
        }
        if let Some(v) = self.auto_download_threshold {
            settings.auto_download_threshold = v;
        }
        settings
    }

    pub fn is_empty(&self) -> bool {
        *self == QualityOverrides::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEntry {
    pub id: i64,
    pub round_id: i64,
    pub event_type: EventType,
    pub status: WatchStatus,
    pub downloader_id: Option<i64>,
    pub quality_overrides: Option<QualityOverrides>,
    pub added_at: DateTime<Utc>,
    pub last_searched_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub attempts: i32,
    pub chosen_nzb: Option<String>,
    /// Suffix appended to sent titles so downloader history can be matched
    /// back to the entry.
    pub tag: Option<String>,
    /// Run guard: only the run holding the current token may write back.
    pub dispatch_token: Option<String>,
    pub acquisition_id: Option<String>,
}

impl WatchEntry {
    /// The tag a send for this entry is labeled with.
    pub fn send_tag(&self) -> String {
        self.tag
            .clone()
            .unwrap_or_else(|| format!("rc-{}-{}", self.round_id, self.event_type.as_str().to_lowercase()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWatchEntry {
    pub round_id: i64,
    pub event_type: EventType,
    #[serde(default)]
    pub downloader_id: Option<i64>,
    #[serde(default)]
    pub quality_overrides: Option<QualityOverrides>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            WatchStatus::Scheduled,
            WatchStatus::Running,
            WatchStatus::WaitingDownload,
            WatchStatus::Completed,
            WatchStatus::Failed,
            WatchStatus::Paused,
        ] {
            assert_eq!(WatchStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(WatchStatus::Completed.is_terminal());
        assert!(!WatchStatus::Failed.is_terminal());
        assert!(!WatchStatus::Paused.is_terminal());
    }

    #[test]
    fn test_overrides_apply_partially() {
        let base = Settings::default();
        let overrides = QualityOverrides {
            auto_download_threshold: Some(95),
            allow_hdr: Some(false),
            ..Default::default()
        };
        let merged = overrides.apply(&base);
        assert_eq!(merged.auto_download_threshold, 95);
        assert!(!merged.allow_hdr);
        assert_eq!(merged.min_resolution, base.min_resolution);
    }

    #[test]
    fn test_send_tag_default_shape() {
        let entry = WatchEntry {
            id: 1,
            round_id: 7,
            event_type: EventType::Qualifying,
            status: WatchStatus::Scheduled,
            downloader_id: None,
            quality_overrides: None,
            added_at: Utc::now(),
            last_searched_at: None,
            next_run_at: None,
            last_error: None,
            attempts: 0,
            chosen_nzb: None,
            tag: None,
            dispatch_token: None,
            acquisition_id: None,
        };
        assert_eq!(entry.send_tag(), "rc-7-qualifying");
    }
}
