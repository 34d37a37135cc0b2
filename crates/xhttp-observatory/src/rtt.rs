use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sentinel RTT values, kept distinct from any real measurement instead of
/// overloading `Duration::MAX` arithmetic (spec.md §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttSentinel {
    /// Every sample in the validity window failed.
    Failed,
    /// No sample has landed in the validity window yet.
    Untested,
    /// Some samples succeeded but the failure rate is too high to trust
    /// the average (more than half the window failed).
    Unqualified,
}

/// Either a trustworthy RTT average or why one isn't available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Measured(Duration),
    Sentinel(RttSentinel),
}

/// Derived statistics over a window of probe results (spec §4.8 "RTT
/// bookkeeping").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStats {
    pub all: usize,
    pub fail: usize,
    pub avg: Option<Duration>,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub deviation: Option<Duration>,
}

impl HealthStats {
    /// `alive := all != fail` (spec §6 Observatory interface).
    #[must_use]
    pub fn alive(&self) -> bool {
        self.all != self.fail
    }

    /// The snapshot's `delay_ms`-equivalent figure: a real average when one
    /// can be trusted, a named sentinel otherwise.
    #[must_use]
    pub fn delay(&self) -> Delay {
        if self.all == 0 {
            return Delay::Sentinel(RttSentinel::Untested);
        }
        if self.fail == self.all {
            return Delay::Sentinel(RttSentinel::Failed);
        }
        #[allow(clippy::cast_precision_loss)]
        let fail_ratio = self.fail as f64 / self.all as f64;
        if fail_ratio > 0.5 {
            return Delay::Sentinel(RttSentinel::Unqualified);
        }
        Delay::Measured(self.avg.unwrap_or_default())
    }
}

struct Sample {
    at: Instant,
    rtt: Option<Duration>,
}

/// A fixed-capacity ring of recent probe results for one outbound tag
/// (spec §3 `OutboundHealth`).
pub struct OutboundHealth {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl OutboundHealth {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Record one probe result. `rtt = None` means the probe failed.
    pub fn record(&mut self, rtt: Option<Duration>, now: Instant) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { at: now, rtt });
    }

    /// Derived stats over samples still inside `validity` of `now` (spec §8
    /// property 8: a stale sample is excluded).
    #[must_use]
    pub fn stats(&self, now: Instant, validity: Duration) -> HealthStats {
        let valid: Vec<&Sample> = self
            .samples
            .iter()
            .filter(|s| now.saturating_duration_since(s.at) <= validity)
            .collect();

        let all = valid.len();
        let fail = valid.iter().filter(|s| s.rtt.is_none()).count();
        let rtts: Vec<Duration> = valid.iter().filter_map(|s| s.rtt).collect();

        if rtts.is_empty() {
            return HealthStats {
                all,
                fail,
                avg: None,
                min: None,
                max: None,
                deviation: None,
            };
        }

        let total: Duration = rtts.iter().sum();
        #[allow(clippy::cast_possible_truncation)]
        let avg = total / rtts.len() as u32;
        let min = *rtts.iter().min().expect("non-empty");
        let max = *rtts.iter().max().expect("non-empty");

        let variance: f64 = rtts
            .iter()
            .map(|r| {
                let diff = r.as_secs_f64() - avg.as_secs_f64();
                diff * diff
            })
            .sum::<f64>()
            / rtts.len() as f64;
        let deviation = Duration::from_secs_f64(variance.sqrt());

        HealthStats {
            all,
            fail,
            avg: Some(avg),
            min: Some(min),
            max: Some(max),
            deviation: Some(deviation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_samples_is_untested() {
        let health = OutboundHealth::new(10);
        let stats = health.stats(Instant::now(), Duration::from_secs(60));
        assert_eq!(stats.delay(), Delay::Sentinel(RttSentinel::Untested));
        assert!(stats.alive());
    }

    #[test]
    fn all_failed_samples_is_failed_and_not_alive() {
        let mut health = OutboundHealth::new(10);
        let now = Instant::now();
        for _ in 0..5 {
            health.record(None, now);
        }
        let stats = health.stats(now, Duration::from_secs(60));
        assert_eq!(stats.delay(), Delay::Sentinel(RttSentinel::Failed));
        assert!(!stats.alive());
    }

    #[test]
    fn majority_failures_is_unqualified() {
        let mut health = OutboundHealth::new(10);
        let now = Instant::now();
        health.record(Some(Duration::from_millis(50)), now);
        health.record(None, now);
        health.record(None, now);
        let stats = health.stats(now, Duration::from_secs(60));
        assert_eq!(stats.delay(), Delay::Sentinel(RttSentinel::Unqualified));
    }

    #[test]
    fn stale_samples_are_excluded_from_stats() {
        let mut health = OutboundHealth::new(10);
        let old = Instant::now();
        health.record(Some(Duration::from_millis(10)), old);
        let later = old + Duration::from_secs(100);
        let stats = health.stats(later, Duration::from_secs(60));
        assert_eq!(stats.all, 0);
    }

    #[test]
    fn ring_drops_oldest_past_capacity() {
        let mut health = OutboundHealth::new(2);
        let now = Instant::now();
        health.record(Some(Duration::from_millis(10)), now);
        health.record(Some(Duration::from_millis(20)), now);
        health.record(Some(Duration::from_millis(30)), now);
        let stats = health.stats(now, Duration::from_secs(60));
        assert_eq!(stats.all, 2);
        assert_eq!(stats.min, Some(Duration::from_millis(20)));
    }
}
