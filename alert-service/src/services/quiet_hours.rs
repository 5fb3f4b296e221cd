//! Quiet-hours suppression gate.
//!
//! Quiet hours suppress push delivery only; inbox recording is never gated
//! here. Most real windows span midnight (22:00-07:00), so the wraparound
//! branch is the common case, not an edge case.

use chrono::{DateTime, Timelike, Utc};

use crate::models::QuietHours;

/// Whether `now` falls inside the user's quiet window.
///
/// The window is half-open `[start_hour, end_hour)`. When
/// `start_hour >= end_hour` the window wraps midnight; an equal start and
/// end means the whole day is quiet while the feature is enabled.
pub fn in_quiet_hours(quiet: &QuietHours, now: DateTime<Utc>) -> bool {
    if !quiet.enabled {
        return false;
    }

    hour_in_window(now.hour(), quiet.start_hour, quiet.end_hour)
}

fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start < end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quiet(enabled: bool, start: u32, end: u32) -> QuietHours {
        QuietHours {
            enabled,
            start_hour: start,
            end_hour: end,
        }
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_disabled_never_suppresses() {
        assert!(!in_quiet_hours(&quiet(false, 0, 23), at_hour(12)));
    }

    #[test]
    fn test_same_day_window() {
        let q = quiet(true, 9, 17);
        assert!(in_quiet_hours(&q, at_hour(9)));
        assert!(in_quiet_hours(&q, at_hour(12)));
        assert!(!in_quiet_hours(&q, at_hour(17)));
        assert!(!in_quiet_hours(&q, at_hour(20)));
    }

    #[test]
    fn test_midnight_wraparound() {
        let q = quiet(true, 22, 6);
        assert!(in_quiet_hours(&q, at_hour(23)));
        assert!(in_quiet_hours(&q, at_hour(5)));
        assert!(in_quiet_hours(&q, at_hour(22)));
        assert!(!in_quiet_hours(&q, at_hour(6)));
        assert!(!in_quiet_hours(&q, at_hour(12)));
    }

    #[test]
    fn test_equal_bounds_means_always_quiet() {
        let q = quiet(true, 8, 8);
        for hour in 0..24 {
            assert!(in_quiet_hours(&q, at_hour(hour)), "hour {hour}");
        }
    }
}
