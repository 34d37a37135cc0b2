use std::time::Duration;

/// Tunables for an [`crate::Observatory`] (spec §4.8 "Configuration
/// defaults").
#[derive(Debug, Clone)]
pub struct ObservatoryConfig {
    /// URL probed on each health ping.
    pub destination: String,
    /// Fallback URL used to tell "this outbound is down" apart from "the
    /// whole network is down".
    pub connectivity: String,
    /// How often one full sampling round runs. Clamped to a floor of 10s.
    pub interval: Duration,
    /// Probes per outbound per round.
    pub sampling_count: usize,
    /// Per-probe timeout.
    pub timeout: Duration,
    /// HTTP method used for the probe request.
    pub method: http::Method,
}

impl Default for ObservatoryConfig {
    fn default() -> Self {
        Self {
            destination: "https://connectivitycheck.gstatic.com/generate_204".to_string(),
            connectivity: "https://connectivitycheck.gstatic.com/generate_204".to_string(),
            interval: Duration::from_secs(60),
            sampling_count: 10,
            timeout: Duration::from_secs(5),
            method: http::Method::HEAD,
        }
    }
}

impl ObservatoryConfig {
    /// The effective round period, clamped per spec §4.8: "interval
    /// (clamped to ≥ 10 s)".
    #[must_use]
    pub fn clamped_interval(&self) -> Duration {
        self.interval.max(Duration::from_secs(10))
    }

    /// Full round period: one `interval`-spaced tick covers
    /// `sampling_count` probes spread across it (spec §4.8 scheduler).
    #[must_use]
    pub fn round_period(&self) -> Duration {
        self.clamped_interval() * self.sampling_count.max(1) as u32
    }

    /// How long a recorded sample stays valid (spec §8 property 8): twice
    /// the round period, since the jittered spread means adjacent rounds
    /// can straddle up to twice the nominal window.
    #[must_use]
    pub fn validity_window(&self) -> Duration {
        self.round_period() * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_below_floor_is_clamped() {
        let config = ObservatoryConfig {
            interval: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(config.clamped_interval(), Duration::from_secs(10));
    }

    #[test]
    fn validity_window_is_twice_round_period() {
        let config = ObservatoryConfig {
            interval: Duration::from_secs(60),
            sampling_count: 10,
            ..Default::default()
        };
        assert_eq!(config.round_period(), Duration::from_secs(600));
        assert_eq!(config.validity_window(), Duration::from_secs(1200));
    }
}
