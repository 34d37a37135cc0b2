use std::time::Duration;

/// Initial broken-H3 window: 5 minutes.
const INITIAL: Duration = Duration::from_secs(5 * 60);
/// Cap on the broken window: 48 hours.
const CAP: Duration = Duration::from_secs(48 * 60 * 60);
/// Doublings beyond which the window stays at `CAP` (spec §4.6: "doubled
/// per consecutive failure up to 48h at 18 doublings").
const MAX_DOUBLINGS: u32 = 18;

/// How long H3 attempts stay suppressed for an authority with `fail_count`
/// consecutive failures, matching a well-known browser's QUIC back-off
/// policy (spec §4.6).
#[must_use]
pub fn broken_window(fail_count: u32) -> Duration {
    if fail_count == 0 {
        return Duration::ZERO;
    }
    let doublings = (fail_count - 1).min(MAX_DOUBLINGS);
    INITIAL
        .checked_mul(1u32 << doublings)
        .map_or(CAP, |window| window.min(CAP))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_failures_is_not_broken() {
        assert_eq!(broken_window(0), Duration::ZERO);
    }

    #[test]
    fn first_failure_is_five_minutes() {
        assert_eq!(broken_window(1), Duration::from_secs(5 * 60));
    }

    #[test]
    fn doubles_each_consecutive_failure() {
        assert_eq!(broken_window(2), Duration::from_secs(10 * 60));
        assert_eq!(broken_window(3), Duration::from_secs(20 * 60));
        assert_eq!(broken_window(4), Duration::from_secs(40 * 60));
    }

    #[test]
    fn caps_at_forty_eight_hours_by_eighteen_doublings() {
        // 5 min * 2^18 = 5 * 262144 min = 1,310,720 min = 21,845.33 hours, far past 48h.
        assert_eq!(broken_window(19), CAP);
        assert_eq!(broken_window(100), CAP);
    }

    #[test]
    fn eighteenth_doubling_already_saturates_the_cap() {
        assert_eq!(broken_window(18), CAP);
    }
}
