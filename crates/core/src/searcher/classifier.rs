//! Release title classification.
//!
//! Scene titles come dotted (`Formula.1.2025.Round03.Bahrain.Qualifying...`)
//! or TV-styled (`Formula 1 S2025E03 ...`). Tokenization replaces `.` and `_`
//! with spaces and lowercases; the extraction regexes run on that normalized
//! form, except the release group which is read off the raw tail.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{CanonicalKey, Classification, SessionTag};

/// Canonical-key size bucket width. Releases within the same 512 MiB bucket
/// are treated as the same encode.
const SIZE_BUCKET_BYTES: u64 = 512 * 1024 * 1024;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19[5-9]\d|20\d{2})\b").expect("valid regex"));

static ROUND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bround ?(\d{1,2})\b").expect("valid regex"));

static TV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bs(\d{4}) ?e(\d{2,3})\b").expect("valid regex"));

// Longest alternatives first so "sprint qualifying" never half-matches.
static SESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(sprint qualifying|sprint shootout|sprint race|post race|practice (?:one|two|three|1|2|3)|free practice (?:one|two|three|1|2|3)|fp1|fp2|fp3|qualifying|quali|qualy|sprint|shakedown|preview|notebook|race)\b",
    )
    .expect("valid regex")
});

static EDITORIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(preview|notebook)\b").expect("valid regex"));

static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(480|576|720|1080|2160)p\b|\b(4k|uhd)\b").expect("valid regex"));

static CODEC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(x264|x265|h264|h265|hevc|av1|avc|vp9)\b").expect("valid regex"));

static HDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(hdr10\+?|hdr|hlg|dolby vision)\b").expect("valid regex"));

// Dotted scene pattern: venue token between round and session.
static DOTTED_VENUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:19|20)\d{2} (?:round ?\d{1,2} )?([a-z ]+?) (?:sprint qualifying|sprint|fp1|fp2|fp3|qualifying|quali|qualy|race|preview|notebook|shakedown|practice)\b",
    )
    .expect("valid regex")
});

// Group is the token after the last hyphen of the raw title, before any
// bracketed tag.
static GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)(?:\s*\[[^\]]*\])?\s*$").expect("valid regex"));

/// Normalize a title for matching: `.`/`_` -> space, lowercase, collapsed
/// whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .replace(['.', '_'], " ")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify a release title.
pub fn classify(title: &str) -> Classification {
    let normalized = normalize_title(title);

    let mut year = YEAR_RE
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let mut round = ROUND_RE
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    // TV-style SyyyyEnn fills whichever of year/round the dotted form missed.
    if let Some(tv) = TV_RE.captures(&normalized) {
        if year.is_none() {
            year = tv.get(1).and_then(|m| m.as_str().parse().ok());
        }
        if round.is_none() {
            round = tv.get(2).and_then(|m| m.as_str().parse().ok());
        }
    }

    // Editorial markers win over session keywords: a "Qualifying Preview" is
    // a preview, not qualifying footage.
    let session = EDITORIAL_RE
        .captures(&normalized)
        .or_else(|| SESSION_RE.captures(&normalized))
        .and_then(|c| c.get(1).map(|m| canonical_session(m.as_str())));

    let venue = DOTTED_VENUE_RE
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty());

    let resolution = RESOLUTION_RE.captures(&normalized).and_then(|c| {
        if let Some(p) = c.get(1) {
            p.as_str().parse().ok()
        } else {
            // 4k / uhd
            Some(2160)
        }
    });

    let codec = CODEC_RE
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let hdr = HDR_RE.is_match(&normalized);

    let group = GROUP_RE
        .captures(title.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        // A bare resolution or codec after a hyphen is not a group name.
        .filter(|g| {
            let lower = g.to_lowercase();
            !RESOLUTION_RE.is_match(&lower) && !CODEC_RE.is_match(&lower)
        });

    Classification {
        year,
        round,
        session,
        venue,
        resolution,
        codec,
        hdr,
        group,
    }
}

fn canonical_session(raw: &str) -> SessionTag {
    match raw {
        "sprint qualifying" | "sprint shootout" => SessionTag::SprintQualifying,
        "sprint race" | "sprint" => SessionTag::Sprint,
        "fp1" | "practice 1" | "practice one" | "free practice 1" | "free practice one" => {
            SessionTag::Fp1
        }
        "fp2" | "practice 2" | "practice two" | "free practice 2" | "free practice two" => {
            SessionTag::Fp2
        }
        "fp3" | "practice 3" | "practice three" | "free practice 3" | "free practice three" => {
            SessionTag::Fp3
        }
        "qualifying" | "quali" | "qualy" => SessionTag::Qualifying,
        "race" | "post race" => SessionTag::Race,
        "preview" => SessionTag::Preview,
        "notebook" => SessionTag::Notebook,
        "shakedown" => SessionTag::Shakedown,
        _ => SessionTag::Other,
    }
}

/// Merge key for a classified release.
pub fn canonical_key(classification: &Classification, size_bytes: u64) -> CanonicalKey {
    CanonicalKey {
        year: classification.year,
        round: classification.round,
        session: classification.session,
        venue: classification.venue.clone(),
        resolution: classification.resolution,
        codec: classification.codec.clone(),
        group: classification.group.as_ref().map(|g| g.to_lowercase()),
        size_bucket: size_bytes / SIZE_BUCKET_BYTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dotted_scene_title() {
        let c = classify("Formula.1.2025.Round03.Bahrain.Qualifying.1080p.x265-NTb");
        assert_eq!(c.year, Some(2025));
        assert_eq!(c.round, Some(3));
        assert_eq!(c.session, Some(SessionTag::Qualifying));
        assert_eq!(c.venue.as_deref(), Some("bahrain"));
        assert_eq!(c.resolution, Some(1080));
        assert_eq!(c.codec.as_deref(), Some("x265"));
        assert_eq!(c.group.as_deref(), Some("NTb"));
        assert!(!c.hdr);
    }

    #[test]
    fn test_classify_spaced_title() {
        let c = classify("F1 2025 Bahrain Qualifying Preview 720p");
        assert_eq!(c.year, Some(2025));
        assert_eq!(c.round, None);
        // editorial marker wins over the session keyword
        assert_eq!(c.session, Some(SessionTag::Preview));
        assert_eq!(c.resolution, Some(720));
    }

    #[test]
    fn test_classify_preview_title() {
        let c = classify("F1 2025 Bahrain Preview 720p");
        assert_eq!(c.session, Some(SessionTag::Preview));
    }

    #[test]
    fn test_classify_tv_style() {
        let c = classify("Formula 1 S2025E03 Qualifying 1080p WEB h264-VERUM");
        assert_eq!(c.year, Some(2025));
        assert_eq!(c.round, Some(3));
        assert_eq!(c.session, Some(SessionTag::Qualifying));
        assert_eq!(c.group.as_deref(), Some("VERUM"));
    }

    #[test]
    fn test_classify_sprint_variants() {
        assert_eq!(
            classify("Formula.1.2025.Sprint.Qualifying.1080p").session,
            Some(SessionTag::SprintQualifying)
        );
        assert_eq!(
            classify("Formula.1.2025.Sprint.Race.1080p").session,
            Some(SessionTag::Sprint)
        );
        assert_eq!(
            classify("Formula.1.2025.Miami.Sprint.1080p").session,
            Some(SessionTag::Sprint)
        );
    }

    #[test]
    fn test_classify_practice_aliases() {
        assert_eq!(
            classify("Formula.1.2025.Bahrain.Practice.One.1080p").session,
            Some(SessionTag::Fp1)
        );
        assert_eq!(
            classify("Formula.1.2025.Bahrain.FP3.SkyF1.1080p").session,
            Some(SessionTag::Fp3)
        );
    }

    #[test]
    fn test_classify_hdr_and_4k() {
        let c = classify("Formula.1.2025.Round01.Bahrain.Race.2160p.HDR.x265-GRP");
        assert_eq!(c.resolution, Some(2160));
        assert!(c.hdr);

        let c4k = classify("F1 2024 Monza Race 4K UHD HLG");
        assert_eq!(c4k.resolution, Some(2160));
        assert!(c4k.hdr);
    }

    #[test]
    fn test_classify_no_false_group_from_resolution() {
        let c = classify("Formula 1 2025 Bahrain Race-1080p");
        assert_eq!(c.group, None);
    }

    #[test]
    fn test_classification_is_idempotent_on_canonical_titles() {
        // Re-classifying a normalized canonical title yields the same result.
        let title = "Formula.1.2025.Round03.Bahrain.Race.1080p.x264-F1Carreras";
        let first = classify(title);
        let again = classify(&normalize_title(title));
        assert_eq!(first, again);
    }

    #[test]
    fn test_canonical_key_merges_dot_and_space_variants() {
        let a = classify("Formula.1.2025.Round03.Bahrain.Race.1080p.x265-NTb");
        let b = classify("Formula 1 2025 Round03 Bahrain Race 1080p x265-ntb");
        assert_eq!(
            canonical_key(&a, 2_000_000_000),
            canonical_key(&b, 2_100_000_000)
        );
    }

    #[test]
    fn test_canonical_key_distinguishes_size_buckets() {
        let c = classify("Formula.1.2025.Round03.Bahrain.Race.1080p");
        assert_ne!(
            canonical_key(&c, 500 * 1024 * 1024),
            canonical_key(&c, 4 * 1024 * 1024 * 1024)
        );
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("Formula.1_2025..Bahrain  Race"),
            "formula 1 2025 bahrain race"
        );
    }
}
