//! Operator-configured endpoints: indexers, downloaders, notification targets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexerKind {
    Newznab,
    Hydra,
    Custom,
}

impl IndexerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerKind::Newznab => "newznab",
            IndexerKind::Hydra => "hydra",
            IndexerKind::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "newznab" => Some(IndexerKind::Newznab),
            "hydra" => Some(IndexerKind::Hydra),
            "custom" => Some(IndexerKind::Custom),
            _ => None,
        }
    }
}

/// A Newznab-compatible indexer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Indexer {
    pub id: i64,
    pub name: String,
    pub kind: IndexerKind,
    pub base_url: String,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub category_ids: Vec<i32>,
    pub priority: i32,
    pub enabled: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIndexer {
    pub name: String,
    pub kind: IndexerKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<i32>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloaderKind {
    Sabnzbd,
    Nzbget,
}

impl DownloaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloaderKind::Sabnzbd => "sabnzbd",
            DownloaderKind::Nzbget => "nzbget",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sabnzbd" => Some(DownloaderKind::Sabnzbd),
            "nzbget" => Some(DownloaderKind::Nzbget),
            _ => None,
        }
    }
}

/// A configured download client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Downloader {
    pub id: i64,
    pub name: String,
    pub kind: DownloaderKind,
    pub base_url: String,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub category: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDownloader {
    pub name: String,
    pub kind: DownloaderKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Lifecycle transitions a notification target can subscribe to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotifyEvent {
    DownloadStart,
    DownloadComplete,
    DownloadFail,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Apprise,
    Webhook,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Apprise => "apprise",
            TargetKind::Webhook => "webhook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apprise" => Some(TargetKind::Apprise),
            "webhook" => Some(TargetKind::Webhook),
            _ => None,
        }
    }
}

/// A notification endpoint with its event filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationTarget {
    pub id: i64,
    pub kind: TargetKind,
    pub name: String,
    /// May embed tokens; never logged raw.
    #[serde(skip_serializing, default)]
    pub url: String,
    pub event_mask: Vec<NotifyEvent>,
    #[serde(skip_serializing, default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotificationTarget {
    pub kind: TargetKind,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub event_mask: Vec<NotifyEvent>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_true() -> bool {
    true
}
