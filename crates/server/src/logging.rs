//! JSON-lines logging: stdout plus a daily-rotated file, with a live-reload
//! handle so the operator can change the level at runtime.

use std::path::{Path, PathBuf};

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use racecarr_core::config::LoggingConfig;

pub struct LogHandle {
    reload: reload::Handle<EnvFilter, Registry>,
    // Dropping this would lose buffered log lines.
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl LogHandle {
    /// Apply a new level filter immediately.
    pub fn set_level(&self, level: &str) -> Result<(), String> {
        let filter = EnvFilter::try_new(level).map_err(|e| e.to_string())?;
        self.reload.reload(filter).map_err(|e| e.to_string())
    }
}

pub fn init_logging(config: &LoggingConfig) -> LogHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let (filter_layer, reload_handle) = reload::Layer::new(filter);

    let file_appender = tracing_appender::rolling::daily(&config.dir, "racecarr.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().json())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer),
        )
        .init();

    LogHandle {
        reload: reload_handle,
        _guard: guard,
    }
}

/// Tail the newest rotated log file, parsing JSON lines into entries.
/// Malformed lines are skipped.
pub fn tail_log(dir: &Path, max_lines: usize) -> Vec<LogEntry> {
    let Some(newest) = newest_log_file(dir) else {
        return Vec::new();
    };
    let Ok(content) = std::fs::read_to_string(&newest) else {
        return Vec::new();
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..]
        .iter()
        .filter_map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).ok()?;
            Some(LogEntry {
                timestamp: value
                    .get("timestamp")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                level: value
                    .get("level")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                message: value
                    .pointer("/fields/message")
                    .or_else(|| value.get("message"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn newest_log_file(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("racecarr.log"))
                .unwrap_or(false)
        })
        .max()
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}
