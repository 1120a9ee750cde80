//! Season refresh: pull provider records and merge them into the store.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{EventType, RoundUpsert, Season, SqliteCatalog};
use crate::clock::Clock;

use super::types::{CalendarError, ProviderRace, ProviderSchedule};
use super::ScheduleProvider;

pub struct SeasonImporter {
    catalog: Arc<SqliteCatalog>,
    clock: Arc<dyn Clock>,
}

impl SeasonImporter {
    pub fn new(catalog: Arc<SqliteCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// Fetch the season from the provider and merge it in.
    ///
    /// Merge rules: rounds upsert by `(season, round_number)`, events upsert
    /// by `(round, type)`. The per-round payload is authoritative where it
    /// disagrees with the season payload, including asserting that a session
    /// does not exist. A permanent provider failure leaves existing rows
    /// untouched.
    pub async fn refresh_season(
        &self,
        provider: &dyn ScheduleProvider,
        year: i32,
    ) -> Result<Season, CalendarError> {
        let payload = provider.fetch_season(year).await?;
        let season = self.catalog.upsert_season(year)?;

        let mut merged_rounds = 0usize;
        for race in &payload.races {
            let Some(round_number) = race.round else {
                warn!(year, "Season payload race without round number, skipped");
                continue;
            };
            let round = self
                .catalog
                .upsert_round(season.id, &round_upsert(race, round_number))?;
            self.merge_schedule(round.id, race.schedule.as_ref(), false)?;

            // Round endpoint refines the season payload.
            match provider.fetch_round(year, round_number).await {
                Ok(Some(round_race)) => {
                    self.catalog
                        .upsert_round(season.id, &round_upsert(&round_race, round_number))?;
                    self.merge_schedule(round.id, round_race.schedule.as_ref(), true)?;
                }
                Ok(None) => {}
                Err(e) => {
                    // Round-level detail is best-effort; the season merge stands.
                    warn!(year, round_number, error = %e, "Round refresh failed");
                }
            }
            merged_rounds += 1;
        }

        self.catalog
            .touch_season_refreshed(season.id, self.clock.now())?;
        info!(year, rounds = merged_rounds, "Season refreshed");

        self.catalog
            .get_season(season.id)?
            .ok_or_else(|| CalendarError::Transient("season vanished mid-refresh".to_string()))
    }

    /// Merge one schedule into a round's events.
    ///
    /// `authoritative` distinguishes round-level payloads: for those, a
    /// missing slot deletes any existing event row of that type.
    fn merge_schedule(
        &self,
        round_id: i64,
        schedule: Option<&ProviderSchedule>,
        authoritative: bool,
    ) -> Result<(), CalendarError> {
        let Some(schedule) = schedule else {
            return Ok(());
        };

        for (event_type, slot) in [
            (EventType::Race, schedule.race.as_ref()),
            (EventType::Qualifying, schedule.qualy.as_ref()),
            (EventType::Fp1, schedule.fp1.as_ref()),
            (EventType::Fp2, schedule.fp2.as_ref()),
            (EventType::Fp3, schedule.fp3.as_ref()),
            (EventType::SprintQualifying, schedule.sprint_qualy.as_ref()),
            (EventType::Sprint, schedule.sprint_race.as_ref()),
        ] {
            match slot {
                Some(slot) => {
                    self.catalog
                        .upsert_event(round_id, event_type, slot.start_utc(), None)?;
                }
                None if authoritative => {
                    self.catalog.delete_event(round_id, event_type)?;
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn round_upsert(race: &ProviderRace, round_number: i32) -> RoundUpsert {
    let circuit = race.circuit.as_ref();
    let name = race
        .race_name
        .clone()
        .or_else(|| race.race_id.clone())
        .unwrap_or_else(|| format!("Round {round_number}"));
    RoundUpsert {
        round_number,
        name,
        circuit: circuit.and_then(|c| c.circuit_name.clone()),
        country: circuit.and_then(|c| c.country.clone()),
        circuit_tz: circuit.and_then(|c| c.timezone.clone()),
    }
}
