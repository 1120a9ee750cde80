//! HTTP client for the schedule metadata provider.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::ProviderConfig;

use super::types::{CalendarError, ProviderRace, ProviderRound, ProviderSeason};

const RETRIES: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 1;

pub struct F1ApiClient {
    client: Client,
    base_url: String,
}

impl F1ApiClient {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the season-level calendar.
    pub async fn fetch_season(&self, year: i32) -> Result<ProviderSeason, CalendarError> {
        let url = format!("{}/api/{}", self.base_url, year);
        self.get_json(&url).await
    }

    /// Fetch a single round. The round payload wins over the season payload
    /// wherever they disagree.
    pub async fn fetch_round(
        &self,
        year: i32,
        round_number: i32,
    ) -> Result<Option<ProviderRace>, CalendarError> {
        let url = format!("{}/api/{}/{}", self.base_url, year, round_number);
        let payload: ProviderRound = self.get_json(&url).await?;
        Ok(payload.race)
    }

    /// GET with retry on transient failures: 3 attempts, exponential backoff
    /// (factor 2, initial 1 s).
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, CalendarError> {
        let mut backoff = Duration::from_secs(INITIAL_BACKOFF_SECS);
        let mut last_err = None;

        for attempt in 1..=RETRIES {
            match self.try_get_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < RETRIES => {
                    warn!(url, attempt, error = %e, "Provider request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| CalendarError::Transient("retries exhausted".to_string())))
    }

    async fn try_get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, CalendarError> {
        debug!(url, "Fetching from schedule provider");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                CalendarError::Transient(e.to_string())
            } else {
                CalendarError::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CalendarError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(CalendarError::Permanent(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))
    }
}
