use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Root process configuration.
///
/// Everything an operator tunes at runtime (quality rules, thresholds,
/// cadence) lives in the settings row in the database instead; this struct
/// only covers what must be known before the store is open.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub scheduler: SchedulerBootConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().expect("valid address literal")
}

fn default_port() -> u16 {
    7878
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("racecarr.db")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Startup default; overridable at runtime through settings.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the rotated JSON log file.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Schedule metadata provider (season/round/session calendar).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_provider_url() -> String {
    "https://f1api.dev".to_string()
}

fn default_provider_timeout() -> u32 {
    15
}

/// Boot-time scheduler knobs. The cadence windows themselves are settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerBootConfig {
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default = "default_global_concurrency")]
    pub global_concurrency: usize,
    #[serde(default = "default_indexer_concurrency")]
    pub per_indexer_concurrency: usize,
}

impl Default for SchedulerBootConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            global_concurrency: default_global_concurrency(),
            per_indexer_concurrency: default_indexer_concurrency(),
        }
    }
}

fn default_tick_seconds() -> u64 {
    600
}

fn default_global_concurrency() -> usize {
    3
}

fn default_indexer_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NotifyConfig {
    /// Base URL of an Apprise API gateway; scheme-mapped delivery is
    /// delegated to it. None disables Apprise targets.
    #[serde(default)]
    pub apprise_gateway: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Sanitized config for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub provider: ProviderConfig,
    pub scheduler: SchedulerBootConfig,
    pub apprise_gateway_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            logging: config.logging.clone(),
            provider: config.provider.clone(),
            scheduler: config.scheduler.clone(),
            apprise_gateway_configured: config.notify.apprise_gateway.is_some(),
        }
    }
}
