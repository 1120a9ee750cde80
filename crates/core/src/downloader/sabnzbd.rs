//! SABnzbd adapter: `mode=addurl` / `mode=queue` / `mode=history` over the
//! query-string API.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::registry::Downloader;

use super::types::{AcquisitionId, AcquisitionStatus, DownloadError, SendRequest};

fn api_url(downloader: &Downloader) -> String {
    format!("{}/api", downloader.base_url.trim_end_matches('/'))
}

fn auth_params(downloader: &Downloader) -> Vec<(String, String)> {
    let mut params = vec![("output".to_string(), "json".to_string())];
    if let Some(key) = &downloader.api_key {
        params.push(("apikey".to_string(), key.clone()));
    }
    params
}

#[derive(Debug, Deserialize)]
struct AddUrlResponse {
    #[serde(default)]
    status: Option<bool>,
    #[serde(default)]
    nzo_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

pub async fn send(
    client: &Client,
    downloader: &Downloader,
    request: &SendRequest,
) -> Result<AcquisitionId, DownloadError> {
    let mut params = auth_params(downloader);
    params.push(("mode".to_string(), "addurl".to_string()));
    params.push(("name".to_string(), request.nzb_url.clone()));
    params.push(("nzbname".to_string(), request.title.clone()));
    params.push(("priority".to_string(), request.priority.to_string()));
    if let Some(category) = &request.category {
        params.push(("cat".to_string(), category.clone()));
    }

    let response = client
        .get(api_url(downloader))
        .query(&params)
        .send()
        .await
        .map_err(|e| DownloadError::Unavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(DownloadError::Unavailable(format!(
            "HTTP {} from SABnzbd",
            response.status()
        )));
    }

    let body: AddUrlResponse = response
        .json()
        .await
        .map_err(|e| DownloadError::Unknown(e.to_string()))?;

    if body.status == Some(true) {
        let id = body
            .nzo_ids
            .first()
            .cloned()
            .unwrap_or_else(|| request.title.clone());
        debug!(downloader = %downloader.name, %id, "SABnzbd accepted job");
        return Ok(AcquisitionId(id));
    }

    Err(classify_error(body.error.as_deref()))
}

fn classify_error(error: Option<&str>) -> DownloadError {
    let Some(error) = error else {
        return DownloadError::Rejected("SABnzbd rejected request".to_string());
    };
    let lower = error.to_lowercase();
    if lower.contains("api key") || lower.contains("apikey") {
        DownloadError::AuthRejected
    } else if lower.contains("category") {
        DownloadError::BadCategory(error.to_string())
    } else {
        DownloadError::Rejected(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(default)]
    queue: Option<QueueBody>,
}

#[derive(Debug, Deserialize)]
struct QueueBody {
    #[serde(default)]
    slots: Vec<QueueSlot>,
}

#[derive(Debug, Deserialize)]
struct QueueSlot {
    #[serde(default)]
    nzo_id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Option<HistoryBody>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    slots: Vec<HistorySlot>,
}

#[derive(Debug, Deserialize)]
struct HistorySlot {
    #[serde(default)]
    nzo_id: String,
    #[serde(default)]
    status: String,
}

pub async fn status(
    client: &Client,
    downloader: &Downloader,
    id: &AcquisitionId,
) -> Result<AcquisitionStatus, DownloadError> {
    // Live queue first, then completed history.
    let mut params = auth_params(downloader);
    params.push(("mode".to_string(), "queue".to_string()));
    let queue: QueueResponse = get_json(client, downloader, &params).await?;
    if let Some(slot) = queue
        .queue
        .map(|q| q.slots)
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.nzo_id == id.0)
    {
        return Ok(map_queue_status(&slot.status));
    }

    let mut params = auth_params(downloader);
    params.push(("mode".to_string(), "history".to_string()));
    params.push(("limit".to_string(), "80".to_string()));
    let history: HistoryResponse = get_json(client, downloader, &params).await?;
    if let Some(slot) = history
        .history
        .map(|h| h.slots)
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.nzo_id == id.0)
    {
        return Ok(map_history_status(&slot.status));
    }

    Ok(AcquisitionStatus::Unknown)
}

pub async fn test(client: &Client, downloader: &Downloader) -> Result<(), DownloadError> {
    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default)]
        status: Option<bool>,
        #[serde(default)]
        error: Option<String>,
    }

    let mut params = auth_params(downloader);
    params.push(("mode".to_string(), "queue".to_string()));
    let probe: Probe = get_json(client, downloader, &params).await?;
    if probe.status == Some(false) {
        return Err(classify_error(probe.error.as_deref()));
    }
    Ok(())
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    downloader: &Downloader,
    params: &[(String, String)],
) -> Result<T, DownloadError> {
    let response = client
        .get(api_url(downloader))
        .query(params)
        .send()
        .await
        .map_err(|e| DownloadError::Unavailable(e.to_string()))?;
    match response.status() {
        s if s.is_success() => {}
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            return Err(DownloadError::AuthRejected)
        }
        s => return Err(DownloadError::Unavailable(format!("HTTP {s} from SABnzbd"))),
    }
    response
        .json()
        .await
        .map_err(|e| DownloadError::Unknown(e.to_string()))
}

fn map_queue_status(raw: &str) -> AcquisitionStatus {
    match raw.to_lowercase().as_str() {
        "downloading" | "fetching" => AcquisitionStatus::Downloading,
        "queued" | "paused" | "grabbing" | "propagating" => AcquisitionStatus::Queued,
        _ => AcquisitionStatus::Downloading,
    }
}

fn map_history_status(raw: &str) -> AcquisitionStatus {
    match raw.to_lowercase().as_str() {
        "completed" => AcquisitionStatus::Completed,
        "failed" => AcquisitionStatus::Failed,
        "queued" | "extracting" | "verifying" | "repairing" | "running" => {
            AcquisitionStatus::Downloading
        }
        _ => AcquisitionStatus::Unknown,
    }
}
