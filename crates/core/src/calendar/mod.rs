//! Schedule metadata: provider client and season importer.

mod f1api;
mod importer;
mod types;

use async_trait::async_trait;

pub use f1api::F1ApiClient;
pub use importer::SeasonImporter;
pub use types::*;

/// Seam over the schedule provider so the importer is testable offline.
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    async fn fetch_season(&self, year: i32) -> Result<ProviderSeason, CalendarError>;

    async fn fetch_round(
        &self,
        year: i32,
        round_number: i32,
    ) -> Result<Option<ProviderRace>, CalendarError>;
}

#[async_trait]
impl ScheduleProvider for F1ApiClient {
    async fn fetch_season(&self, year: i32) -> Result<ProviderSeason, CalendarError> {
        F1ApiClient::fetch_season(self, year).await
    }

    async fn fetch_round(
        &self,
        year: i32,
        round_number: i32,
    ) -> Result<Option<ProviderRace>, CalendarError> {
        F1ApiClient::fetch_round(self, year, round_number).await
    }
}
