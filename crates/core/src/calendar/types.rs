//! Provider payload types.
//!
//! The schedule provider is tolerant territory: `round` arrives as a string
//! or a number, session slots may be missing or null, and timestamps come as
//! separate date/time fields or a combined ISO string with a trailing `Z`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Provider request failed: {0}")]
    Transient(String),

    #[error("Provider rejected request: {0}")]
    Permanent(String),

    #[error("Provider payload unparseable: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] crate::db::StoreError),
}

impl CalendarError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CalendarError::Transient(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSeason {
    #[serde(default)]
    pub races: Vec<ProviderRace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRound {
    #[serde(default)]
    pub race: Option<ProviderRace>,
    // The round endpoint also carries winner/teamWinner/fast_lap; results are
    // not part of the acquisition pipeline so they are dropped at parse time.
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRace {
    #[serde(default, deserialize_with = "flexible_round")]
    pub round: Option<i32>,
    #[serde(default, rename = "raceId")]
    pub race_id: Option<String>,
    #[serde(default, rename = "raceName")]
    pub race_name: Option<String>,
    #[serde(default)]
    pub circuit: Option<ProviderCircuit>,
    #[serde(default)]
    pub schedule: Option<ProviderSchedule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCircuit {
    #[serde(default, rename = "circuitName")]
    pub circuit_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Session slots. A `None` at season level means "unknown"; at round level it
/// asserts the session does not exist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSchedule {
    #[serde(default)]
    pub race: Option<ProviderSlot>,
    #[serde(default)]
    pub qualy: Option<ProviderSlot>,
    #[serde(default)]
    pub fp1: Option<ProviderSlot>,
    #[serde(default)]
    pub fp2: Option<ProviderSlot>,
    #[serde(default)]
    pub fp3: Option<ProviderSlot>,
    #[serde(default, rename = "sprintQualy")]
    pub sprint_qualy: Option<ProviderSlot>,
    #[serde(default, rename = "sprintRace")]
    pub sprint_race: Option<ProviderSlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSlot {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

impl ProviderSlot {
    /// Combine `date` + `time` into a UTC instant. Dates without a time
    /// resolve to midnight; malformed values resolve to `None`.
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        let date = self.date.as_deref()?;
        match self.time.as_deref() {
            Some(time) => {
                let trimmed = time.trim_end_matches('Z');
                let combined = format!("{date}T{trimmed}");
                NaiveDateTime::parse_from_str(&combined, "%Y-%m-%dT%H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(&combined, "%Y-%m-%dT%H:%M"))
                    .ok()
                    .map(|naive| naive.and_utc())
            }
            None => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc()),
        }
    }
}

/// Accept `"3"`, `3`, or null for the round number.
fn flexible_round<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i32),
        Text(String),
        None,
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(Some(n)),
        Raw::Text(s) => Ok(s.trim().parse().ok()),
        Raw::None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_round_accepts_string_and_number() {
        let a: ProviderRace = serde_json::from_str(r#"{"round": "3"}"#).unwrap();
        assert_eq!(a.round, Some(3));
        let b: ProviderRace = serde_json::from_str(r#"{"round": 3}"#).unwrap();
        assert_eq!(b.round, Some(3));
        let c: ProviderRace = serde_json::from_str(r#"{"round": "n/a"}"#).unwrap();
        assert_eq!(c.round, None);
    }

    #[test]
    fn test_slot_combines_date_and_time() {
        let slot = ProviderSlot {
            date: Some("2025-03-15".to_string()),
            time: Some("16:00:00Z".to_string()),
        };
        let start = slot.start_utc().unwrap();
        assert_eq!(start.hour(), 16);
        assert_eq!(start.to_rfc3339(), "2025-03-15T16:00:00+00:00");
    }

    #[test]
    fn test_slot_date_only_is_midnight() {
        let slot = ProviderSlot {
            date: Some("2025-03-15".to_string()),
            time: None,
        };
        assert_eq!(slot.start_utc().unwrap().hour(), 0);
    }

    #[test]
    fn test_slot_malformed_is_none() {
        let slot = ProviderSlot {
            date: Some("soon".to_string()),
            time: None,
        };
        assert!(slot.start_utc().is_none());
    }

    #[test]
    fn test_schedule_tolerates_null_sessions() {
        let schedule: ProviderSchedule = serde_json::from_str(
            r#"{"race": {"date": "2025-03-16", "time": "15:00:00"}, "fp2": null}"#,
        )
        .unwrap();
        assert!(schedule.race.is_some());
        assert!(schedule.fp2.is_none());
        assert!(schedule.sprint_race.is_none());
    }
}
