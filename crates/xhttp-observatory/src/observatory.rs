use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::config::ObservatoryConfig;
use crate::dispatcher::{Dispatcher, OutboundSelector};
use crate::rtt::{HealthStats, OutboundHealth};

/// A point-in-time view of one outbound's health (spec §6 Observatory
/// interface `GetOutboundStatus`).
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub alive: bool,
    pub stats: HealthStats,
}

/// C8: periodically pings each selected outbound and keeps a rolling RTT
/// history per tag (spec §4.8).
pub struct Observatory {
    config: ObservatoryConfig,
    dispatcher: Arc<dyn Dispatcher>,
    health: DashMap<String, OutboundHealth>,
}

impl Observatory {
    #[must_use]
    pub fn new(config: ObservatoryConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            health: DashMap::new(),
        }
    }

    /// Spawn the scheduler task. Each round asks `selector` which tags to
    /// probe, drops bookkeeping for tags no longer selected, and spreads
    /// `sampling_count` probes per tag with jitter across the round
    /// (spec §4.8 scheduler).
    pub fn start(self: &Arc<Self>, selector: Arc<dyn OutboundSelector>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(this.config.round_period());
            loop {
                tick.tick().await;
                let tags = selector.select();
                this.health.retain(|tag, _| tags.contains(tag));
                for tag in tags {
                    let this = this.clone();
                    tokio::spawn(async move { this.sample_round(&tag).await });
                }
            }
        })
    }

    async fn sample_round(&self, tag: &str) {
        let round_period = self.config.round_period();
        for _ in 0..self.config.sampling_count {
            let jitter = Duration::from_millis(fastrand::u64(..round_period.as_millis() as u64));
            tokio::time::sleep(jitter).await;
            self.probe(tag).await;
        }
    }

    /// Run one probe against `tag`'s outbound, falling back to a
    /// connectivity check on failure so a down outbound is told apart from a
    /// down network (spec §8 property: network-down samples are dropped,
    /// not counted as failures).
    async fn probe(&self, tag: &str) {
        let now = Instant::now();
        let client = match self.dispatcher.client_for(tag).await {
            Ok(client) => client,
            Err(err) => {
                warn!(tag, error = %err, "observatory: could not obtain a client for outbound");
                return;
            }
        };

        let result = self.timed_request(&client, &self.config.destination).await;
        match result {
            Ok(rtt) => {
                trace!(tag, ?rtt, "observatory: probe ok");
                self.record(tag, Some(rtt), now);
            }
            Err(()) => {
                if self.timed_request(&client, &self.config.connectivity).await.is_err() {
                    debug!(tag, "observatory: network appears down, dropping sample");
                } else {
                    debug!(tag, "observatory: outbound unreachable, network is up");
                    self.record(tag, None, now);
                }
            }
        }
    }

    async fn timed_request(&self, client: &reqwest::Client, url: &str) -> Result<Duration, ()> {
        let start = Instant::now();
        let req = client.request(self.config.method.clone(), url).timeout(self.config.timeout);
        match req.send().await {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => Ok(start.elapsed()),
            _ => Err(()),
        }
    }

    fn record(&self, tag: &str, rtt: Option<Duration>, now: Instant) {
        self.health
            .entry(tag.to_string())
            .or_insert_with(|| OutboundHealth::new(self.config.sampling_count))
            .record(rtt, now);
    }

    /// Current health snapshot for `tag`, if it has ever been probed.
    #[must_use]
    pub fn snapshot(&self, tag: &str) -> Option<Snapshot> {
        let health = self.health.get(tag)?;
        let stats = health.stats(Instant::now(), self.config.validity_window());
        Some(Snapshot {
            alive: stats.alive(),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xhttp_core::TunnelError;

    use super::*;

    struct SingleClientDispatcher {
        calls: AtomicUsize,
    }

    impl Dispatcher for SingleClientDispatcher {
        fn client_for<'a>(
            &'a self,
            _tag: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<reqwest::Client, TunnelError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(reqwest::Client::new()) })
        }
    }

    #[tokio::test]
    async fn reachable_destination_records_a_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let config = ObservatoryConfig {
            destination: format!("{}/ping", server.uri()),
            method: http::Method::GET,
            ..Default::default()
        };
        let dispatcher = Arc::new(SingleClientDispatcher { calls: AtomicUsize::new(0) });
        let observatory = Observatory::new(config, dispatcher);
        observatory.probe("direct").await;

        let snapshot = observatory.snapshot("direct").unwrap();
        assert!(snapshot.alive);
        assert_eq!(snapshot.stats.fail, 0);
    }

    #[tokio::test]
    async fn unreachable_destination_with_reachable_connectivity_is_a_failure() {
        let destination = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&destination)
            .await;
        let connectivity = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gen204"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&connectivity)
            .await;

        let config = ObservatoryConfig {
            destination: format!("{}/ping", destination.uri()),
            connectivity: format!("{}/gen204", connectivity.uri()),
            method: http::Method::GET,
            ..Default::default()
        };
        let dispatcher = Arc::new(SingleClientDispatcher { calls: AtomicUsize::new(0) });
        let observatory = Observatory::new(config, dispatcher);
        for _ in 0..10 {
            observatory.probe("direct").await;
        }

        let snapshot = observatory.snapshot("direct").unwrap();
        assert!(!snapshot.alive);
        assert_eq!(snapshot.stats.fail, 10);
        assert_eq!(snapshot.stats.all, 10);
    }

    #[tokio::test]
    async fn unreachable_destination_and_connectivity_is_network_down_and_drops_samples() {
        let config = ObservatoryConfig {
            destination: "http://127.0.0.1:1".to_string(),
            connectivity: "http://127.0.0.1:1".to_string(),
            method: http::Method::GET,
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let dispatcher = Arc::new(SingleClientDispatcher { calls: AtomicUsize::new(0) });
        let observatory = Observatory::new(config, dispatcher);
        for _ in 0..10 {
            observatory.probe("direct").await;
        }

        assert!(observatory.snapshot("direct").is_none());
    }
}
