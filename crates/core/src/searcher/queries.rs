//! Query fan-out for one (year, round, session).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::catalog::{EventType, Round};
use crate::settings::Settings;

use super::types::IndexerQuery;

/// Sponsor and series filler words stripped from round names when deriving
/// the venue token ("Gulf Air Bahrain Grand Prix" -> "Bahrain").
static SPONSOR_TOKENS: &[&str] = &[
    "grand", "prix", "gp", "formula", "f1", "fia", "airways", "air", "gulf", "aramco", "stc",
    "heineken", "rolex", "pirelli", "crypto.com", "msc", "lenovo", "qatar", "etihad", "emirates",
    "aws", "louis", "vuitton",
];

static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9 ]+").expect("valid regex"));

/// Venue tokens for a round: city-ish name, country, circuit short name, plus
/// any operator-configured aliases. The resolver table in settings ships
/// empty.
#[derive(Debug, Clone)]
pub struct VenueAliases {
    pub aliases: Vec<String>,
}

impl VenueAliases {
    pub fn for_round(round: &Round, settings: &Settings) -> Self {
        let mut seen = HashSet::new();
        let mut aliases = Vec::new();

        let mut push = |value: String| {
            let value = value.trim().to_string();
            if value.len() >= 3 && seen.insert(value.to_lowercase()) {
                aliases.push(value);
            }
        };

        if let Some(venue) = strip_sponsor_tokens(&round.name) {
            push(venue);
        }
        if let Some(country) = &round.country {
            push(country.clone());
        }
        if let Some(circuit) = &round.circuit {
            if let Some(short) = circuit_short_name(circuit) {
                push(short);
            }
        }
        for key in [
            round.name.to_lowercase(),
            round
                .circuit
                .as_deref()
                .unwrap_or_default()
                .to_lowercase(),
        ] {
            if let Some(extra) = settings.venue_aliases.get(&key) {
                for alias in extra {
                    push(alias.clone());
                }
            }
        }

        Self { aliases }
    }

    pub fn primary(&self) -> Option<&str> {
        self.aliases.first().map(|s| s.as_str())
    }

    /// Whether any alias appears in an already-normalized (lowercase,
    /// space-separated) title.
    pub fn matches(&self, normalized_title: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| normalized_title.contains(&alias.to_lowercase()))
    }
}

/// Drop sponsor tokens from a round name, keeping the geographic part.
pub fn strip_sponsor_tokens(name: &str) -> Option<String> {
    let cleaned = NON_ALNUM_RE.replace_all(name, " ");
    let kept: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| {
            let lower = token.to_lowercase();
            !SPONSOR_TOKENS.contains(&lower.as_str()) && lower.parse::<u32>().is_err()
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

/// Best-effort short name for a circuit ("Bahrain International Circuit" ->
/// "Bahrain").
fn circuit_short_name(circuit: &str) -> Option<String> {
    let stop = ["international", "circuit", "autodromo", "raceway", "street", "park"];
    let kept: Vec<&str> = circuit
        .split_whitespace()
        .filter(|token| !stop.contains(&token.to_lowercase().as_str()))
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

/// Query phrases a session is searched under.
fn session_phrases(event_type: EventType) -> &'static [&'static str] {
    match event_type {
        EventType::Fp1 => &["FP1", "Practice"],
        EventType::Fp2 => &["FP2", "Practice"],
        EventType::Fp3 => &["FP3", "Practice"],
        EventType::Qualifying => &["Qualifying"],
        EventType::Sprint => &["Sprint"],
        EventType::SprintQualifying => &["Sprint Qualifying"],
        EventType::Race => &["Race"],
        EventType::Other => &["Race"],
    }
}

/// Build the fan-out query set for one session of one round.
///
/// Five shapes per venue alias / session phrase, deduplicated:
/// 1. `Formula 1 {year} {venue} {session}`
/// 2. `Formula1 {year} Round{round:02} {venue} {session}`
/// 3. `F1 {year} {venue} {session}`
/// 4. `Formula 1 {session}` as tvsearch with `season={year}&ep={round}`
/// 5. (1)-(3) repeated for each venue alias.
pub fn build_queries(
    year: i32,
    round: &Round,
    event_type: EventType,
    settings: &Settings,
) -> Vec<IndexerQuery> {
    let venues = VenueAliases::for_round(round, settings);
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    let mut push = |query: IndexerQuery| {
        if seen.insert(query.clone()) {
            queries.push(query);
        }
    };

    for session in session_phrases(event_type) {
        for venue in &venues.aliases {
            push(IndexerQuery::Text {
                q: format!("Formula 1 {year} {venue} {session}"),
            });
            push(IndexerQuery::Text {
                q: format!(
                    "Formula1 {year} Round{:02} {venue} {session}",
                    round.round_number
                ),
            });
            push(IndexerQuery::Text {
                q: format!("F1 {year} {venue} {session}"),
            });
        }
        if venues.aliases.is_empty() {
            // Session-only fallback when the round has no usable venue token.
            push(IndexerQuery::Text {
                q: format!("Formula 1 {year} {session}"),
            });
        }
        push(IndexerQuery::Tv {
            q: format!("Formula 1 {session}"),
            season: year,
            ep: round.round_number,
        });
    }

    queries
}
