//! NZBGet adapter: JSON-RPC `append` / `listgroups` / `history`.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::registry::Downloader;

use super::types::{AcquisitionId, AcquisitionStatus, DownloadError, SendRequest};

fn rpc_url(downloader: &Downloader) -> String {
    format!("{}/jsonrpc", downloader.base_url.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

async fn call(
    client: &Client,
    downloader: &Downloader,
    method: &str,
    params: Value,
) -> Result<Value, DownloadError> {
    let payload = json!({
        "method": method,
        "params": params,
        "id": 1,
    });

    let mut request = client.post(rpc_url(downloader)).json(&payload);
    if let Some(key) = &downloader.api_key {
        request = request.basic_auth(key, Some(""));
    }

    let response = request
        .send()
        .await
        .map_err(|e| DownloadError::Unavailable(e.to_string()))?;
    match response.status() {
        s if s.is_success() => {}
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            return Err(DownloadError::AuthRejected)
        }
        s => return Err(DownloadError::Unavailable(format!("HTTP {s} from NZBGet"))),
    }

    let body: RpcResponse = response
        .json()
        .await
        .map_err(|e| DownloadError::Unknown(e.to_string()))?;
    if let Some(error) = body.error {
        let lower = error.message.to_lowercase();
        if lower.contains("auth") || lower.contains("password") {
            return Err(DownloadError::AuthRejected);
        }
        return Err(DownloadError::Unknown(format!(
            "NZBGet error {}: {}",
            error.code, error.message
        )));
    }
    body.result
        .ok_or_else(|| DownloadError::Unknown("NZBGet response without result".to_string()))
}

/// `append(NZBFilename, Content, Category, Priority, AddToTop, AddPaused,
/// DupeKey, DupeScore, DupeMode)`; the content parameter carries the URL.
pub async fn send(
    client: &Client,
    downloader: &Downloader,
    request: &SendRequest,
) -> Result<AcquisitionId, DownloadError> {
    let params = json!([
        request.title,
        request.nzb_url,
        request.category.clone().unwrap_or_default(),
        request.priority,
        false,
        false,
        request.title,
        0,
        "SCORE",
    ]);
    let result = call(client, downloader, "append", params).await?;

    match result.as_i64() {
        Some(nzb_id) if nzb_id > 0 => {
            debug!(downloader = %downloader.name, nzb_id, "NZBGet accepted job");
            Ok(AcquisitionId(nzb_id.to_string()))
        }
        Some(_) => Err(DownloadError::Rejected(
            "NZBGet rejected append".to_string(),
        )),
        // Old servers answer append with a boolean.
        None if result.as_bool() == Some(true) => Ok(AcquisitionId(request.title.clone())),
        None => Err(DownloadError::Unknown(format!(
            "unexpected append result: {result}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct Group {
    #[serde(default, rename = "NZBID")]
    nzb_id: i64,
    #[serde(default, rename = "Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default, rename = "NZBID")]
    nzb_id: i64,
    #[serde(default, rename = "Status")]
    status: String,
}

pub async fn status(
    client: &Client,
    downloader: &Downloader,
    id: &AcquisitionId,
) -> Result<AcquisitionStatus, DownloadError> {
    let Ok(nzb_id) = id.0.parse::<i64>() else {
        return Ok(AcquisitionStatus::Unknown);
    };

    let groups_value = call(client, downloader, "listgroups", json!([0])).await?;
    let groups: Vec<Group> =
        serde_json::from_value(groups_value).map_err(|e| DownloadError::Unknown(e.to_string()))?;
    if let Some(group) = groups.iter().find(|g| g.nzb_id == nzb_id) {
        return Ok(map_group_status(&group.status));
    }

    let history_value = call(client, downloader, "history", json!([false])).await?;
    let history: Vec<HistoryEntry> =
        serde_json::from_value(history_value).map_err(|e| DownloadError::Unknown(e.to_string()))?;
    if let Some(entry) = history.iter().find(|h| h.nzb_id == nzb_id) {
        return Ok(map_history_status(&entry.status));
    }

    Ok(AcquisitionStatus::Unknown)
}

pub async fn test(client: &Client, downloader: &Downloader) -> Result<(), DownloadError> {
    call(client, downloader, "version", json!([])).await.map(|_| ())
}

fn map_group_status(raw: &str) -> AcquisitionStatus {
    let upper = raw.to_uppercase();
    if upper.starts_with("DOWNLOADING") || upper.starts_with("POST") || upper.starts_with("PP_") {
        AcquisitionStatus::Downloading
    } else {
        AcquisitionStatus::Queued
    }
}

fn map_history_status(raw: &str) -> AcquisitionStatus {
    let upper = raw.to_uppercase();
    if upper.starts_with("SUCCESS") {
        AcquisitionStatus::Completed
    } else if upper.starts_with("FAILURE") || upper.starts_with("DELETED") {
        AcquisitionStatus::Failed
    } else {
        AcquisitionStatus::Unknown
    }
}
