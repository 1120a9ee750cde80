//! Mock download client for orchestration tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::downloader::{
    AcquisitionId, AcquisitionStatus, DownloadClient, DownloadError, SendRequest,
};
use crate::registry::Downloader;

pub struct MockDownloadClient {
    send_results: Mutex<Vec<Result<AcquisitionId, DownloadError>>>,
    status_results: Mutex<Vec<AcquisitionStatus>>,
    sends: Mutex<Vec<SendRequest>>,
    status_calls: Mutex<Vec<AcquisitionId>>,
}

impl MockDownloadClient {
    pub fn new() -> Self {
        Self {
            send_results: Mutex::new(Vec::new()),
            status_results: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            status_calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a send result; when drained, sends succeed with a fresh id.
    pub async fn push_send_result(&self, result: Result<AcquisitionId, DownloadError>) {
        self.send_results.lock().await.push(result);
    }

    /// Queue a status result; when drained, status reports Downloading.
    pub async fn push_status(&self, status: AcquisitionStatus) {
        self.status_results.lock().await.push(status);
    }

    pub async fn sends(&self) -> Vec<SendRequest> {
        self.sends.lock().await.clone()
    }

    pub async fn send_count(&self) -> usize {
        self.sends.lock().await.len()
    }
}

impl Default for MockDownloadClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    async fn send(
        &self,
        _downloader: &Downloader,
        request: &SendRequest,
    ) -> Result<AcquisitionId, DownloadError> {
        self.sends.lock().await.push(request.clone());
        let mut results = self.send_results.lock().await;
        if !results.is_empty() {
            return results.remove(0);
        }
        Ok(AcquisitionId(format!(
            "mock-nzo-{}",
            self.sends.lock().await.len()
        )))
    }

    async fn status(
        &self,
        _downloader: &Downloader,
        id: &AcquisitionId,
    ) -> Result<AcquisitionStatus, DownloadError> {
        self.status_calls.lock().await.push(id.clone());
        let mut results = self.status_results.lock().await;
        if !results.is_empty() {
            return Ok(results.remove(0));
        }
        Ok(AcquisitionStatus::Downloading)
    }

    async fn test(&self, _downloader: &Downloader) -> Result<(), DownloadError> {
        Ok(())
    }
}
