use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::broken_window::broken_window;

/// Process-wide per-authority race state (spec §3 `EndpointInfo`).
///
/// Entries are long-lived but cheap; `last_fail`/`fail_count` drive the
/// broken-H3 window, `smoothed_rtt` feeds the H2 delay heuristic.
#[derive(Debug, Clone, Copy)]
pub struct EndpointInfo {
    pub last_fail: Option<Instant>,
    pub fail_count: u32,
    pub smoothed_rtt: Option<Duration>,
}

impl Default for EndpointInfo {
    fn default() -> Self {
        Self {
            last_fail: None,
            fail_count: 0,
            smoothed_rtt: None,
        }
    }
}

/// EWMA smoothing factor for RTT updates (spec §4.6).
const RTT_ALPHA: f64 = 0.125;

impl EndpointInfo {
    /// Whether H3 is currently considered broken for this authority: a
    /// failure occurred and the broken window computed from `fail_count`
    /// has not yet elapsed.
    #[must_use]
    pub fn is_broken(&self, now: Instant) -> bool {
        match self.last_fail {
            Some(last_fail) => now.duration_since(last_fail) < broken_window(self.fail_count),
            None => false,
        }
    }

    fn record_success(&mut self, rtt: Duration) {
        self.fail_count = 0;
        self.last_fail = None;
        self.smoothed_rtt = Some(match self.smoothed_rtt {
            Some(prev) => {
                let prev_secs = prev.as_secs_f64();
                let rtt_secs = rtt.as_secs_f64();
                Duration::from_secs_f64(RTT_ALPHA.mul_add(rtt_secs - prev_secs, prev_secs))
            }
            None => rtt,
        });
    }

    fn record_failure(&mut self, now: Instant) {
        self.fail_count = self.fail_count.saturating_add(1);
        self.last_fail = Some(now);
    }
}

/// The process-wide authority map, owned explicitly rather than a bare
/// `static` (spec.md §9 "Global endpoint map" design note).
#[derive(Debug, Default)]
pub struct RaceRegistry {
    endpoints: DashMap<String, EndpointInfo>,
}

impl RaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self, authority: &str) -> EndpointInfo {
        self.endpoints.get(authority).map_or_else(EndpointInfo::default, |e| *e)
    }

    pub fn record_success(&self, authority: &str, rtt: Duration) {
        self.endpoints
            .entry(authority.to_string())
            .or_default()
            .record_success(rtt);
    }

    pub fn record_failure(&self, authority: &str) {
        self.endpoints
            .entry(authority.to_string())
            .or_default()
            .record_failure(Instant::now());
    }

    #[must_use]
    pub fn is_broken(&self, authority: &str) -> bool {
        self.endpoints
            .get(authority)
            .is_some_and(|e| e.is_broken(Instant::now()))
    }

    /// Clears all state. Intended for test teardown between cases that
    /// share a registry; never called from production code.
    pub fn clear(&self) {
        self.endpoints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_authority_is_not_broken() {
        let reg = RaceRegistry::new();
        assert!(!reg.is_broken("example.com:443"));
    }

    #[test]
    fn failure_marks_broken_until_window_elapses() {
        let reg = RaceRegistry::new();
        reg.record_failure("example.com:443");
        assert!(reg.is_broken("example.com:443"));
    }

    #[test]
    fn success_clears_broken_state() {
        let reg = RaceRegistry::new();
        reg.record_failure("example.com:443");
        reg.record_success("example.com:443", Duration::from_millis(50));
        assert!(!reg.is_broken("example.com:443"));
        assert_eq!(reg.snapshot("example.com:443").fail_count, 0);
    }

    #[test]
    fn rtt_smooths_toward_new_samples() {
        let reg = RaceRegistry::new();
        reg.record_success("a", Duration::from_millis(100));
        reg.record_success("a", Duration::from_millis(200));
        let rtt = reg.snapshot("a").smoothed_rtt.unwrap();
        // EWMA(100ms, 200ms, alpha=0.125) = 100 + 0.125*100 = 112.5ms
        assert!((rtt.as_secs_f64() - 0.1125).abs() < 0.001);
    }
}
