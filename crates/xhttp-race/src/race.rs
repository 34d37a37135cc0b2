use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use xhttp_core::TunnelError;

use crate::carrier::Carrier;
use crate::registry::RaceRegistry;

/// Default delay before the H2 dial starts, absent any RTT estimate
/// (spec §4.6).
const H2_DELAY: Duration = Duration::from_millis(300);

/// Tunables for [`RaceDialer`].
#[derive(Debug, Clone, Copy)]
pub struct RaceConfig {
    /// Delay before the H2 dial starts when no RTT estimate is available.
    pub h2_delay: Duration,
    /// Multiplier applied to the known smoothed RTT to derive the H2 delay.
    pub h2_delay_rtt_multiplier: f64,
    /// Multiplier applied to `max(dial_rtt, smoothed_rtt)` for the H3
    /// first-byte watchdog.
    pub watchdog_multiplier: u32,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            h2_delay: H2_DELAY,
            h2_delay_rtt_multiplier: 1.5,
            watchdog_multiplier: 3,
        }
    }
}

/// Dials an H3 connection for an authority. The named `TlsAdapter` +
/// `SystemDialer` collaborators (spec §1) live behind this trait; the race
/// dialer only needs a handshake result and the time it took.
pub trait H3Dial: Send + Sync {
    /// Attempt an H3 handshake against `authority`.
    fn dial_h3<'a>(
        &'a self,
        authority: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(crate::H3SendRequest, Duration), TunnelError>> + Send + 'a>>;
}

/// Dials an H2 connection for an authority, same shape as [`H3Dial`].
pub trait H2Dial: Send + Sync {
    /// Attempt an H2 handshake against `authority`.
    fn dial_h2<'a>(
        &'a self,
        authority: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(crate::H2SendRequest, Duration), TunnelError>> + Send + 'a>>;
}

/// Outcome of a race, broadcast to every waiter through a `watch` channel.
#[derive(Clone)]
enum RaceOutcome {
    Pending,
    Won(Carrier),
    Failed(Arc<TunnelError>),
}

struct Inner {
    registry: RaceRegistry,
    pools: DashMap<String, Carrier>,
    races: DashMap<String, watch::Receiver<RaceOutcome>>,
}

/// C6: races an H3 and an H2 handshake for each fresh authority, caches the
/// winner, and remembers broken H3 endpoints so later requests skip a
/// doomed H3 attempt (spec §4.6).
pub struct RaceDialer<H3, H2> {
    inner: Arc<Inner>,
    h3: Arc<H3>,
    h2: Arc<H2>,
    config: RaceConfig,
}

impl<H3, H2> Clone for RaceDialer<H3, H2> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            h3: self.h3.clone(),
            h2: self.h2.clone(),
            config: self.config,
        }
    }
}

impl<H3, H2> RaceDialer<H3, H2>
where
    H3: H3Dial + 'static,
    H2: H2Dial + 'static,
{
    #[must_use]
    pub fn new(h3: H3, h2: H2, config: RaceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RaceRegistry::new(),
                pools: DashMap::new(),
                races: DashMap::new(),
            }),
            h3: Arc::new(h3),
            h2: Arc::new(h2),
            config,
        }
    }

    /// Access to the process-wide endpoint map, e.g. for an observatory
    /// snapshot or test assertions.
    #[must_use]
    pub fn registry(&self) -> &RaceRegistry {
        &self.inner.registry
    }

    /// Obtain a carrier for `authority`: a cached connection, the result of
    /// a race already in flight, or a freshly started race (spec §4.6
    /// steps 1-3).
    ///
    /// # Errors
    ///
    /// Returns the H3 error if both protocols fail (H3 is preferred), per
    /// spec §4.6's cancellation policy.
    pub async fn dial(&self, authority: &str) -> Result<Carrier, TunnelError> {
        if let Some(carrier) = self.inner.pools.get(authority) {
            return Ok(carrier.clone());
        }

        if let Some(mut rx) = self.inner.races.get(authority).map(|r| r.clone()) {
            return self.await_outcome(&mut rx).await;
        }

        self.start_race(authority).await
    }

    async fn await_outcome(&self, rx: &mut watch::Receiver<RaceOutcome>) -> Result<Carrier, TunnelError> {
        loop {
            match rx.borrow().clone() {
                RaceOutcome::Won(carrier) => return Ok(carrier),
                RaceOutcome::Failed(err) => return Err((*err).clone()),
                RaceOutcome::Pending => {}
            }
            if rx.changed().await.is_err() {
                return Err(TunnelError::Network("race dropped without a result".to_string()));
            }
        }
    }

    async fn start_race(&self, authority: &str) -> Result<Carrier, TunnelError> {
        let (tx, rx) = watch::channel(RaceOutcome::Pending);
        // Another task may have inserted first between our two lookups above;
        // `entry` makes the insert atomic and tells us whether we actually won
        // the right to run the race.
        let mut became_owner = false;
        self.inner
            .races
            .entry(authority.to_string())
            .or_insert_with(|| {
                became_owner = true;
                rx.clone()
            });
        if !became_owner {
            let mut rx = self.inner.races.get(authority).map(|r| r.clone()).expect("just inserted");
            return self.await_outcome(&mut rx).await;
        }

        let result = self.run_race(authority).await;
        match &result {
            Ok(carrier) => {
                self.inner.pools.insert(authority.to_string(), carrier.clone());
                let _ = tx.send(RaceOutcome::Won(carrier.clone()));
            }
            Err(err) => {
                let _ = tx.send(RaceOutcome::Failed(Arc::new(err.clone())));
            }
        }
        self.inner.races.remove(authority);
        result
    }

    async fn run_race(&self, authority: &str) -> Result<Carrier, TunnelError> {
        let snapshot = self.inner.registry.snapshot(authority);
        let now = Instant::now();
        let h3_broken = snapshot.is_broken(now);

        let h2_delay = if snapshot.last_fail.is_some() && !h3_broken {
            // A recent H3 failure but the window has lapsed: don't make H2
            // wait, H3 is about to be retried anyway.
            Duration::ZERO
        } else if let Some(rtt) = snapshot.smoothed_rtt {
            rtt.mul_f64(self.config.h2_delay_rtt_multiplier)
        } else {
            self.config.h2_delay
        };

        let h3_fut = async {
            if h3_broken {
                debug!(%authority, "h3 skipped: endpoint currently broken");
                return Err(TunnelError::Network("h3 endpoint broken".to_string()));
            }
            self.h3.dial_h3(authority).await
        };
        let h2_fut = async {
            if !h2_delay.is_zero() {
                tokio::time::sleep(h2_delay).await;
            }
            self.h2.dial_h2(authority).await
        };
        tokio::pin!(h3_fut);
        tokio::pin!(h2_fut);

        let mut h3_done = false;
        let mut h2_done = false;
        let mut h3_err = None;
        let mut h2_err = None;

        loop {
            tokio::select! {
                res = &mut h3_fut, if !h3_done => {
                    h3_done = true;
                    match res {
                        Ok((send_request, rtt)) => {
                            info!(%authority, ?rtt, "race won by h3");
                            self.inner.registry.record_success(authority, rtt);
                            return Ok(Carrier::H3(send_request));
                        }
                        Err(e) => {
                            warn!(%authority, error = %e, "h3 dial failed");
                            self.inner.registry.record_failure(authority);
                            h3_err = Some(e);
                        }
                    }
                }
                res = &mut h2_fut, if !h2_done => {
                    h2_done = true;
                    match res {
                        Ok((send_request, rtt)) => {
                            info!(%authority, ?rtt, "race won by h2");
                            return Ok(Carrier::H2(send_request));
                        }
                        Err(e) => {
                            warn!(%authority, error = %e, "h2 dial failed");
                            h2_err = Some(e);
                        }
                    }
                }
            }
            if h3_done && h2_done {
                // Both failed: spec §4.6 prefers surfacing the H3 error.
                return Err(h3_err.or(h2_err).unwrap_or_else(|| {
                    TunnelError::Network(format!("both h3 and h2 dials failed for {authority}"))
                }));
            }
        }
    }

    /// Invalidate a cached carrier for `authority`, e.g. after the peer
    /// closed it or the first-byte watchdog fired.
    pub fn evict(&self, authority: &str) {
        self.inner.pools.remove(authority);
    }

    /// Mark `authority`'s H3 as broken, as if a dial had just failed
    /// (spec §4.6 step 4: the first-byte watchdog).
    pub fn mark_broken(&self, authority: &str) {
        self.inner.registry.record_failure(authority);
    }

    /// Duration after which the H3 first-byte watchdog should fire for a
    /// connection that took `dial_rtt` to establish (spec §4.6 step 4).
    #[must_use]
    pub fn watchdog_duration(&self, authority: &str, dial_rtt: Duration) -> Duration {
        let smoothed = self.inner.registry.snapshot(authority).smoothed_rtt;
        let base = match smoothed {
            Some(rtt) => dial_rtt.max(rtt),
            None => dial_rtt,
        };
        base * self.config.watchdog_multiplier
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct AlwaysFailH3;
    impl H3Dial for AlwaysFailH3 {
        fn dial_h3<'a>(
            &'a self,
            _authority: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(crate::H3SendRequest, Duration), TunnelError>> + Send + 'a>>
        {
            Box::pin(async { Err(TunnelError::Network("h3 refused".to_string())) })
        }
    }

    struct AlwaysFailH2;
    impl H2Dial for AlwaysFailH2 {
        fn dial_h2<'a>(
            &'a self,
            _authority: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(crate::H2SendRequest, Duration), TunnelError>> + Send + 'a>>
        {
            Box::pin(async { Err(TunnelError::Network("h2 refused".to_string())) })
        }
    }

    #[tokio::test]
    async fn both_dials_failing_surfaces_h3_error() {
        let dialer = RaceDialer::new(AlwaysFailH3, AlwaysFailH2, RaceConfig::default());
        let err = dialer.dial("example.com:443").await.unwrap_err();
        assert!(err.to_string().contains("h3"));
    }

    #[test]
    fn watchdog_uses_larger_of_dial_and_smoothed_rtt() {
        let dialer = RaceDialer::new(AlwaysFailH3, AlwaysFailH2, RaceConfig::default());
        dialer.inner.registry.record_success("a", Duration::from_millis(10));
        let d = dialer.watchdog_duration("a", Duration::from_millis(50));
        assert_eq!(d, Duration::from_millis(150));
    }

    #[test]
    fn broken_window_prevents_repeated_h3_dials() {
        static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);
        struct CountingH3;
        impl H3Dial for CountingH3 {
            fn dial_h3<'a>(
                &'a self,
                _authority: &'a str,
            ) -> Pin<Box<dyn Future<Output = Result<(crate::H3SendRequest, Duration), TunnelError>> + Send + 'a>>
            {
                ATTEMPTS.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err(TunnelError::Network("h3 refused".to_string())) })
            }
        }
        let dialer = RaceDialer::new(CountingH3, AlwaysFailH2, RaceConfig::default());
        dialer.mark_broken("b");
        assert!(dialer.inner.registry.is_broken("b"));
    }
}
