//! Entity graph: seasons own rounds, rounds own sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A championship season, keyed by year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Season {
    pub id: i64,
    pub year: i32,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub is_hidden: bool,
}

/// A Grand Prix weekend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub id: i64,
    pub season_id: i64,
    pub round_number: i32,
    pub name: String,
    pub circuit: Option<String>,
    pub country: Option<String>,
    /// IANA timezone of the circuit, when the provider knows it.
    pub circuit_tz: Option<String>,
}

/// A discrete on-track session within a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    pub round_id: i64,
    pub event_type: EventType,
    pub start_time_utc: Option<DateTime<Utc>>,
    pub end_time_utc: Option<DateTime<Utc>>,
}

/// Canonical session types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    #[serde(rename = "FP1")]
    Fp1,
    #[serde(rename = "FP2")]
    Fp2,
    #[serde(rename = "FP3")]
    Fp3,
    Qualifying,
    Sprint,
    SprintQualifying,
    Race,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Fp1 => "FP1",
            EventType::Fp2 => "FP2",
            EventType::Fp3 => "FP3",
            EventType::Qualifying => "Qualifying",
            EventType::Sprint => "Sprint",
            EventType::SprintQualifying => "SprintQualifying",
            EventType::Race => "Race",
            EventType::Other => "Other",
        }
    }

    /// Parse a stored or operator-supplied name, case-insensitively.
    pub fn parse(s: &str) -> Option<EventType> {
        match s.to_lowercase().replace([' ', '-', '_'], "").as_str() {
            "fp1" | "practice1" | "practiceone" => Some(EventType::Fp1),
            "fp2" | "practice2" | "practicetwo" => Some(EventType::Fp2),
            "fp3" | "practice3" | "practicethree" => Some(EventType::Fp3),
            "qualifying" | "qualy" | "quali" => Some(EventType::Qualifying),
            "sprint" | "sprintrace" => Some(EventType::Sprint),
            "sprintqualifying" | "sprintqualy" | "sprintshootout" => {
                Some(EventType::SprintQualifying)
            }
            "race" | "grandprix" => Some(EventType::Race),
            "other" => Some(EventType::Other),
            _ => None,
        }
    }

    /// All session types a watch entry can target.
    pub fn all() -> &'static [EventType] {
        &[
            EventType::Fp1,
            EventType::Fp2,
            EventType::Fp3,
            EventType::Qualifying,
            EventType::Sprint,
            EventType::SprintQualifying,
            EventType::Race,
        ]
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for ty in EventType::all() {
            assert_eq!(EventType::parse(ty.as_str()), Some(*ty));
        }
    }

    #[test]
    fn test_event_type_parse_aliases() {
        assert_eq!(EventType::parse("qualy"), Some(EventType::Qualifying));
        assert_eq!(EventType::parse("Sprint Qualifying"), Some(EventType::SprintQualifying));
        assert_eq!(EventType::parse("sprint-race"), Some(EventType::Sprint));
        assert_eq!(EventType::parse("PRACTICE1"), Some(EventType::Fp1));
        assert_eq!(EventType::parse("bogus"), None);
    }

    #[test]
    fn test_event_type_serde_names() {
        assert_eq!(serde_json::to_string(&EventType::Fp1).unwrap(), "\"FP1\"");
        assert_eq!(
            serde_json::to_string(&EventType::SprintQualifying).unwrap(),
            "\"SprintQualifying\""
        );
    }
}
