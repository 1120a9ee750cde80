//! Download client adapters behind one uniform contract.

mod nzbget;
mod sabnzbd;
mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::registry::{Downloader, DownloaderKind};

pub use types::*;

const HTTP_TIMEOUT_SECS: u64 = 15;
/// Repeat sends of the same URL inside this window return the prior id
/// without re-POSTing.
const DEDUPE_WINDOW_SECS: i64 = 5 * 60;

/// Uniform contract over download clients.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    async fn send(
        &self,
        downloader: &Downloader,
        request: &SendRequest,
    ) -> Result<AcquisitionId, DownloadError>;

    async fn status(
        &self,
        downloader: &Downloader,
        id: &AcquisitionId,
    ) -> Result<AcquisitionStatus, DownloadError>;

    async fn test(&self, downloader: &Downloader) -> Result<(), DownloadError>;
}

/// Dispatches per downloader kind and deduplicates repeat sends.
pub struct DownloaderHub {
    client: Client,
    clock: Arc<dyn Clock>,
    recent_sends: Mutex<HashMap<String, (AcquisitionId, DateTime<Utc>)>>,
}

impl DownloaderHub {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            clock,
            recent_sends: Mutex::new(HashMap::new()),
        }
    }

    fn dedupe_key(downloader: &Downloader, nzb_url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(downloader.id.to_le_bytes());
        hasher.update(nzb_url.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl DownloadClient for DownloaderHub {
    async fn send(
        &self,
        downloader: &Downloader,
        request: &SendRequest,
    ) -> Result<AcquisitionId, DownloadError> {
        let key = Self::dedupe_key(downloader, &request.nzb_url);
        let now = self.clock.now();

        {
            let mut recent = self.recent_sends.lock().await;
            recent.retain(|_, (_, at)| (now - *at).num_seconds() < DEDUPE_WINDOW_SECS);
            if let Some((id, _)) = recent.get(&key) {
                debug!(downloader = %downloader.name, %id, "Duplicate send suppressed");
                return Ok(id.clone());
            }
        }

        let id = match downloader.kind {
            DownloaderKind::Sabnzbd => sabnzbd::send(&self.client, downloader, request).await?,
            DownloaderKind::Nzbget => nzbget::send(&self.client, downloader, request).await?,
        };

        self.recent_sends
            .lock()
            .await
            .insert(key, (id.clone(), now));
        Ok(id)
    }

    async fn status(
        &self,
        downloader: &Downloader,
        id: &AcquisitionId,
    ) -> Result<AcquisitionStatus, DownloadError> {
        match downloader.kind {
            DownloaderKind::Sabnzbd => sabnzbd::status(&self.client, downloader, id).await,
            DownloaderKind::Nzbget => nzbget::status(&self.client, downloader, id).await,
        }
    }

    async fn test(&self, downloader: &Downloader) -> Result<(), DownloadError> {
        match downloader.kind {
            DownloaderKind::Sabnzbd => sabnzbd::test(&self.client, downloader).await,
            DownloaderKind::Nzbget => nzbget::test(&self.client, downloader).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn downloader(id: i64) -> Downloader {
        Downloader {
            id,
            name: "sab".to_string(),
            kind: DownloaderKind::Sabnzbd,
            base_url: "http://sab.example:8080".to_string(),
            api_key: Some("key".to_string()),
            category: Some("f1".to_string()),
            priority: 0,
            enabled: true,
            last_error: None,
        }
    }

    #[test]
    fn test_dedupe_key_varies_by_downloader_and_url() {
        let a = DownloaderHub::dedupe_key(&downloader(1), "https://x/get/1");
        let b = DownloaderHub::dedupe_key(&downloader(2), "https://x/get/1");
        let c = DownloaderHub::dedupe_key(&downloader(1), "https://x/get/2");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_repeat_send_within_window_returns_prior_id() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 15, 17, 0, 0).unwrap(),
        ));
        let hub = DownloaderHub::new(clock);
        let key = DownloaderHub::dedupe_key(&downloader(1), "https://x/get/1");

        // Seed the dedupe map directly; the network path is exercised by the
        // per-adapter tests and mocks.
        hub.recent_sends.lock().await.insert(
            key,
            (AcquisitionId("SABnzbd_nzo_1".to_string()), hub.clock.now()),
        );

        let id = hub
            .send(
                &downloader(1),
                &SendRequest {
                    nzb_url: "https://x/get/1".to_string(),
                    title: "title".to_string(),
                    category: None,
                    priority: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(id.0, "SABnzbd_nzo_1");
    }

    #[tokio::test]
    async fn test_dedupe_window_expires() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 15, 17, 0, 0).unwrap(),
        ));
        let hub = DownloaderHub::new(Arc::clone(&clock) as Arc<dyn Clock>);
        let key = DownloaderHub::dedupe_key(&downloader(1), "https://x/get/1");
        hub.recent_sends.lock().await.insert(
            key.clone(),
            (AcquisitionId("old".to_string()), clock.now()),
        );

        clock.advance(chrono::Duration::minutes(6));

        // The stale entry is swept before lookup; the send would then hit the
        // network (and fail here), proving the cached id is no longer used.
        let result = hub
            .send(
                &downloader(1),
                &SendRequest {
                    nzb_url: "https://x/get/1".to_string(),
                    title: "title".to_string(),
                    category: None,
                    priority: 0,
                },
            )
            .await;
        assert!(result.is_err());
        assert!(!hub.recent_sends.lock().await.contains_key(&key));
    }
}
