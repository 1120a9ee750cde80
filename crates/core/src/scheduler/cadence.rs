//! Search cadence relative to a session's start time.
//!
//! One gated first search at `start + 30 min`, an aggressive window where
//! every tick searches again, a decay window of spaced retries, and a hard
//! stop after `stop_after_days`.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::settings::Settings;

/// Anchor offset for the first search after a session starts.
pub const FIRST_SEARCH_OFFSET_MIN: i64 = 30;

/// Cooldown after a downloader reports a failed download.
pub const FAILED_DOWNLOAD_COOLDOWN: Duration = Duration::hours(1);

/// What the scheduler should do with a due entry right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cadence {
    /// Session started more than `stop_after_days` ago; complete the entry,
    /// dispatch nothing.
    Expired,
    /// Before the first-search anchor: wait, dispatch nothing.
    Gated { next_run: DateTime<Utc> },
    /// Session start unknown: check back at decay pace, dispatch nothing.
    Tbd { next_run: DateTime<Utc> },
    /// Search now; on a miss, come back at `next_run`.
    Ready { next_run: DateTime<Utc> },
}

impl Cadence {
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        match self {
            Cadence::Expired => None,
            Cadence::Gated { next_run }
            | Cadence::Tbd { next_run }
            | Cadence::Ready { next_run } => Some(*next_run),
        }
    }
}

/// Compute the cadence decision, jitter not yet applied.
pub fn plan(start: Option<DateTime<Utc>>, now: DateTime<Utc>, settings: &Settings) -> Cadence {
    let Some(start) = start else {
        return Cadence::Tbd {
            next_run: now + Duration::hours(settings.decay_interval_h),
        };
    };

    if now - start > Duration::days(settings.stop_after_days) {
        return Cadence::Expired;
    }

    let anchor = start + Duration::minutes(FIRST_SEARCH_OFFSET_MIN);
    if now < anchor {
        return Cadence::Gated { next_run: anchor };
    }

    if now - start <= Duration::hours(settings.aggressive_window_h) {
        Cadence::Ready {
            next_run: now + Duration::seconds(settings.scheduler_tick_seconds as i64),
        }
    } else {
        Cadence::Ready {
            next_run: now + Duration::hours(settings.decay_interval_h),
        }
    }
}

/// Uniform random offset in `[-jitter, +jitter]` to spread entries that
/// would otherwise fire on the same instant.
pub fn apply_jitter(at: DateTime<Utc>, jitter_seconds: i64) -> DateTime<Utc> {
    if jitter_seconds <= 0 {
        return at;
    }
    let offset = rand::thread_rng().gen_range(-jitter_seconds..=jitter_seconds);
    at + Duration::seconds(offset)
}

/// Cooldown after a transient failure: exponential in the attempt count,
/// capped at the decay interval.
pub fn transient_cooldown(attempts: i32, settings: &Settings) -> Duration {
    let base = settings.scheduler_tick_seconds.max(60) as i64;
    let exponent = attempts.clamp(1, 10) - 1;
    let secs = base.saturating_mul(1i64 << exponent);
    Duration::seconds(secs).min(Duration::hours(settings.decay_interval_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> Settings {
        Settings::default() // tick 600s, aggressive 24h, decay 6h, stop 14d
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 16, 0, 0).unwrap()
    }

    #[test]
    fn test_before_anchor_is_gated() {
        let now = start() + Duration::minutes(5);
        let plan = plan(Some(start()), now, &settings());
        assert_eq!(
            plan,
            Cadence::Gated {
                next_run: start() + Duration::minutes(30)
            }
        );
    }

    #[test]
    fn test_aggressive_window_reschedules_at_tick_pace() {
        let now = start() + Duration::minutes(31);
        match plan(Some(start()), now, &settings()) {
            Cadence::Ready { next_run } => {
                assert_eq!(next_run, now + Duration::seconds(600));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_decay_window_reschedules_at_decay_pace() {
        let now = start() + Duration::hours(30);
        match plan(Some(start()), now, &settings()) {
            Cadence::Ready { next_run } => {
                assert_eq!(next_run, now + Duration::hours(6));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_aggressive_window_boundary_is_inclusive() {
        let now = start() + Duration::hours(24);
        match plan(Some(start()), now, &settings()) {
            Cadence::Ready { next_run } => {
                assert_eq!(next_run, now + Duration::seconds(600));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_after_stop_days() {
        let now = start() + Duration::days(15);
        assert_eq!(plan(Some(start()), now, &settings()), Cadence::Expired);
    }

    #[test]
    fn test_unknown_start_is_tbd_at_decay_pace() {
        let now = start();
        assert_eq!(
            plan(None, now, &settings()),
            Cadence::Tbd {
                next_run: now + Duration::hours(6)
            }
        );
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let at = start();
        for _ in 0..200 {
            let jittered = apply_jitter(at, 120);
            let delta = (jittered - at).num_seconds();
            assert!((-120..=120).contains(&delta));
        }
    }

    #[test]
    fn test_jitter_zero_is_identity() {
        assert_eq!(apply_jitter(start(), 0), start());
    }

    #[test]
    fn test_transient_cooldown_grows_and_caps() {
        let settings = settings();
        let first = transient_cooldown(1, &settings);
        let second = transient_cooldown(2, &settings);
        let huge = transient_cooldown(9, &settings);

        assert_eq!(first, Duration::seconds(600));
        assert_eq!(second, Duration::seconds(1200));
        assert_eq!(huge, Duration::hours(6)); // capped at decay interval
        assert!(first < second);
    }
}
