//! Additive scoring of classified releases against a requested session.

use std::cmp::Ordering;

use crate::catalog::EventType;
use crate::settings::Settings;

use super::classifier::normalize_title;
use super::queries::VenueAliases;
use super::types::{Classification, ReleaseCandidate, SessionTag};

/// What a score is computed against.
#[derive(Debug, Clone)]
pub struct ScoreContext<'a> {
    pub year: i32,
    pub round_number: i32,
    pub requested: EventType,
    pub venues: &'a VenueAliases,
    pub settings: &'a Settings,
}

/// Outcome of scoring one classification.
#[derive(Debug, Clone)]
pub struct Score {
    pub value: i32,
    pub reasons: Vec<String>,
    /// Year or round contradiction: excluded from auto-grab regardless of
    /// the total.
    pub hard_mismatch: bool,
}

pub fn score(title: &str, classification: &Classification, ctx: &ScoreContext) -> Score {
    let mut value = 0;
    let mut reasons = Vec::new();
    let mut hard_mismatch = false;

    match classification.year {
        Some(year) if year == ctx.year => {
            value += 40;
            reasons.push(format!("year {year} matched (+40)"));
        }
        Some(year) => {
            value -= 40;
            hard_mismatch = true;
            reasons.push(format!("year {year} != {} (-40)", ctx.year));
        }
        None => {}
    }

    match classification.round {
        Some(round) if round == ctx.round_number => {
            value += 35;
            reasons.push(format!("round {round} matched (+35)"));
        }
        Some(round) => {
            value -= 40;
            hard_mismatch = true;
            reasons.push(format!("round {round} != {} (-40)", ctx.round_number));
        }
        None => {}
    }

    let requested_tag = SessionTag::from_event(ctx.requested);
    match classification.session {
        Some(session) if session == requested_tag => {
            value += 25;
            reasons.push(format!("session {} matched (+25)", session.as_str()));
        }
        Some(session) if session.is_editorial() => {
            value -= 20;
            reasons.push(format!(
                "{} when {} was requested (-20)",
                session.as_str(),
                requested_tag.as_str()
            ));
        }
        _ => {}
    }

    let normalized = normalize_title(title);
    if ctx.venues.matches(&normalized) {
        value += 15;
        reasons.push("venue matched (+15)".to_string());
    }

    if let Some(group) = &classification.group {
        if ctx
            .settings
            .preferred_groups
            .iter()
            .any(|g| g.eq_ignore_ascii_case(group))
        {
            value += 10;
            reasons.push(format!("preferred group {group} (+10)"));
        }
    }

    let in_resolution_range = classification.resolution.map(|r| {
        r >= ctx.settings.min_resolution && r <= ctx.settings.max_resolution
    });

    if let (Some(codec), Some(true)) = (&classification.codec, in_resolution_range) {
        if ctx
            .settings
            .preferred_codecs
            .iter()
            .any(|c| c.eq_ignore_ascii_case(codec))
        {
            value += 5;
            reasons.push(format!("preferred codec {codec} (+5)"));
        }
    }

    if classification.hdr && !ctx.settings.allow_hdr {
        value -= 25;
        reasons.push("HDR disallowed (-25)".to_string());
    }

    if in_resolution_range == Some(false) {
        value -= 30;
        reasons.push(format!(
            "resolution {} outside {}-{} (-30)",
            classification.resolution.unwrap_or_default(),
            ctx.settings.min_resolution,
            ctx.settings.max_resolution
        ));
    }

    Score {
        value,
        reasons,
        hard_mismatch,
    }
}

/// Tie-break ordering for equal scores: preferred resolution match, then
/// preferred codec match, then newer pubdate, then smaller deviation from the
/// median size of equally-keyed releases.
pub fn compare_candidates(
    a: &ReleaseCandidate,
    b: &ReleaseCandidate,
    settings: &Settings,
    median_size: u64,
) -> Ordering {
    b.score.cmp(&a.score).then_with(|| {
        let a_res = resolution_preferred(a, settings);
        let b_res = resolution_preferred(b, settings);
        b_res.cmp(&a_res).then_with(|| {
            let a_codec = codec_preferred(a, settings);
            let b_codec = codec_preferred(b, settings);
            b_codec.cmp(&a_codec).then_with(|| {
                b.pub_date.cmp(&a.pub_date).then_with(|| {
                    size_deviation(a, median_size).cmp(&size_deviation(b, median_size))
                })
            })
        })
    })
}

fn resolution_preferred(candidate: &ReleaseCandidate, settings: &Settings) -> bool {
    candidate
        .classification
        .resolution
        .map(|r| r == settings.max_resolution)
        .unwrap_or(false)
}

fn codec_preferred(candidate: &ReleaseCandidate, settings: &Settings) -> bool {
    candidate
        .classification
        .codec
        .as_ref()
        .map(|c| {
            settings
                .preferred_codecs
                .iter()
                .any(|p| p.eq_ignore_ascii_case(c))
        })
        .unwrap_or(false)
}

fn size_deviation(candidate: &ReleaseCandidate, median: u64) -> u64 {
    candidate.size_bytes.abs_diff(median)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Round;
    use crate::searcher::classifier::classify;

    fn round() -> Round {
        Round {
            id: 1,
            season_id: 1,
            round_number: 3,
            name: "Bahrain Grand Prix".to_string(),
            circuit: Some("Bahrain International Circuit".to_string()),
            country: Some("Bahrain".to_string()),
            circuit_tz: None,
        }
    }

    fn settings() -> Settings {
        Settings {
            min_resolution: 720,
            max_resolution: 1080,
            allow_hdr: false,
            preferred_codecs: vec!["x265".to_string()],
            preferred_groups: vec!["NTb".to_string()],
            ..Default::default()
        }
    }

    fn score_title(title: &str, requested: EventType) -> Score {
        let settings = settings();
        let round = round();
        let venues = VenueAliases::for_round(&round, &settings);
        let ctx = ScoreContext {
            year: 2025,
            round_number: 3,
            requested,
            venues: &venues,
            settings: &settings,
        };
        score(title, &classify(title), &ctx)
    }

    #[test]
    fn test_full_match_scores_130() {
        // 40 year + 35 round + 25 session + 15 venue + 10 group + 5 codec
        let s = score_title(
            "Formula.1.2025.Round03.Bahrain.Qualifying.1080p.x265-NTb",
            EventType::Qualifying,
        );
        assert_eq!(s.value, 130);
        assert!(!s.hard_mismatch);
        assert_eq!(s.reasons.len(), 6);
    }

    #[test]
    fn test_preview_penalized_below_threshold() {
        let s = score_title("F1 2025 Bahrain Qualifying Preview 720p", EventType::Qualifying);
        // 40 year - 20 preview + 15 venue
        assert_eq!(s.value, 35);
        assert!(!s.hard_mismatch);
    }

    #[test]
    fn test_year_mismatch_is_hard() {
        let s = score_title(
            "Formula.1.2024.Round03.Bahrain.Qualifying.1080p",
            EventType::Qualifying,
        );
        assert!(s.hard_mismatch);
        assert!(s.reasons.iter().any(|r| r.contains("-40")));
    }

    #[test]
    fn test_round_mismatch_is_hard() {
        let s = score_title(
            "Formula.1.2025.Round07.Bahrain.Qualifying.1080p",
            EventType::Qualifying,
        );
        assert!(s.hard_mismatch);
    }

    #[test]
    fn test_missing_round_is_not_a_mismatch() {
        let s = score_title("F1 2025 Bahrain Qualifying 1080p", EventType::Qualifying);
        assert!(!s.hard_mismatch);
        // 40 + 25 + 15
        assert_eq!(s.value, 80);
    }

    #[test]
    fn test_hdr_penalty_when_disallowed() {
        let s = score_title(
            "Formula.1.2025.Round03.Bahrain.Race.1080p.HDR.x265-NTb",
            EventType::Race,
        );
        assert!(s.reasons.iter().any(|r| r.contains("HDR")));
    }

    #[test]
    fn test_out_of_range_resolution_penalty_and_no_codec_bonus() {
        let s = score_title(
            "Formula.1.2025.Round03.Bahrain.Race.2160p.x265-NTb",
            EventType::Race,
        );
        // 40 + 35 + 25 + 15 + 10 group - 30 resolution; codec bonus requires
        // in-range resolution.
        assert_eq!(s.value, 95);
    }

    fn candidate(title: &str, score: i32, size: u64) -> ReleaseCandidate {
        ReleaseCandidate {
            title: title.to_string(),
            nzb_url: "https://indexer.example/get/1".to_string(),
            indexers: vec!["idx".to_string()],
            indexer_id: 1,
            size_bytes: size,
            pub_date: None,
            classification: classify(title),
            score,
            reasons: vec![],
            hard_mismatch: false,
        }
    }

    #[test]
    fn test_tiebreak_prefers_max_resolution() {
        let settings = settings();
        let a = candidate("Formula.1.2025.Round03.Bahrain.Race.1080p", 80, 1000);
        let b = candidate("Formula.1.2025.Round03.Bahrain.Race.720p", 80, 1000);
        assert_eq!(
            compare_candidates(&a, &b, &settings, 1000),
            Ordering::Less // a sorts first
        );
    }

    #[test]
    fn test_tiebreak_prefers_codec_when_resolution_equal() {
        let settings = settings();
        let a = candidate("Formula.1.2025.Round03.Bahrain.Race.1080p.x265", 80, 1000);
        let b = candidate("Formula.1.2025.Round03.Bahrain.Race.1080p.x264", 80, 1000);
        assert_eq!(compare_candidates(&a, &b, &settings, 1000), Ordering::Less);
    }

    #[test]
    fn test_tiebreak_smaller_size_deviation_wins_last() {
        let settings = settings();
        let a = candidate("Formula.1.2025.Round03.Bahrain.Race.1080p", 80, 1100);
        let b = candidate("Formula.1.2025.Round03.Bahrain.Race.1080p", 80, 4000);
        assert_eq!(compare_candidates(&a, &b, &settings, 1000), Ordering::Less);
    }

    #[test]
    fn test_higher_score_always_first() {
        let settings = settings();
        let a = candidate("Formula.1.2025.Round03.Bahrain.Race.720p", 90, 1000);
        let b = candidate("Formula.1.2025.Round03.Bahrain.Race.1080p.x265", 80, 1000);
        assert_eq!(compare_candidates(&a, &b, &settings, 1000), Ordering::Less);
    }
}
