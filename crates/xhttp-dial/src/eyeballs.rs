use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace};
use xhttp_core::TunnelError;

use crate::system_dialer::{SockOpt, SystemDialer};

/// Tunables for [`race_dial`] (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct HappyEyeballsConfig {
    /// How long to wait after launching one attempt before launching the
    /// next, unless a result arrives first.
    pub try_delay: Duration,
    /// Upper bound on attempts in flight at once.
    pub max_concurrent_try: usize,
    /// Which address family leads the interleaved order.
    pub prefer_v6: bool,
    /// How many addresses of the preferred family precede each address of
    /// the other family in the interleaved order (RFC 8305 §4).
    pub interleave: u32,
}

impl Default for HappyEyeballsConfig {
    fn default() -> Self {
        Self {
            try_delay: Duration::from_millis(250),
            max_concurrent_try: 4,
            prefer_v6: false,
            interleave: 1,
        }
    }
}

fn interleave(candidates: &[IpAddr], prefer_v6: bool, ratio: u32) -> Vec<IpAddr> {
    let ratio = ratio.max(1) as usize;
    let (primary, secondary): (Vec<IpAddr>, Vec<IpAddr>) = if prefer_v6 {
        candidates.iter().copied().partition(IpAddr::is_ipv6)
    } else {
        candidates.iter().copied().partition(IpAddr::is_ipv4)
    };

    let mut primary = primary.into_iter();
    let mut secondary = secondary.into_iter();
    let mut ordered = Vec::with_capacity(candidates.len());
    loop {
        let mut took_any = false;
        for _ in 0..ratio {
            if let Some(ip) = primary.next() {
                ordered.push(ip);
                took_any = true;
            }
        }
        if let Some(ip) = secondary.next() {
            ordered.push(ip);
            took_any = true;
        }
        if !took_any {
            break;
        }
    }
    ordered
}

/// Race TCP connects across `candidates` (mixed IPv4/IPv6), launching one
/// attempt every `try_delay` capped at `max_concurrent_try` in flight,
/// cancelling the rest on first success.
///
/// # Panics
///
/// Panics if `candidates` has fewer than two addresses — racing a single
/// address is a caller bug, not a runtime condition (spec §4.7).
pub async fn race_dial<D>(
    dialer: Arc<D>,
    candidates: &[IpAddr],
    port: u16,
    src: Option<SocketAddr>,
    sockopt: SockOpt,
    config: HappyEyeballsConfig,
) -> Result<D::Connection, TunnelError>
where
    D: SystemDialer + 'static,
{
    assert!(
        candidates.len() >= 2,
        "HappyEyeballs requires at least two candidate addresses, got {}",
        candidates.len()
    );

    let ordered = interleave(candidates, config.prefer_v6, config.interleave);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_try.max(1)));
    let sockopt = Arc::new(sockopt);

    let mut join_set: JoinSet<Result<D::Connection, TunnelError>> = JoinSet::new();
    let mut next_idx = 0usize;
    let mut last_err: Option<TunnelError> = None;

    while next_idx < ordered.len() || !join_set.is_empty() {
        if next_idx < ordered.len() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            let dest = SocketAddr::new(ordered[next_idx], port);
            trace!(%dest, attempt = next_idx, "happy eyeballs: launching attempt");
            next_idx += 1;

            let dialer = dialer.clone();
            let sockopt = sockopt.clone();
            join_set.spawn(async move {
                let _permit = permit;
                dialer.dial(src, dest, &sockopt).await
            });

            tokio::select! {
                () = tokio::time::sleep(config.try_delay) => {}
                Some(res) = join_set.join_next() => {
                    if let Some(conn) = settle(res, &mut last_err) {
                        join_set.abort_all();
                        return Ok(conn);
                    }
                }
            }
        } else if let Some(res) = join_set.join_next().await {
            if let Some(conn) = settle(res, &mut last_err) {
                join_set.abort_all();
                return Ok(conn);
            }
        }
    }

    debug!("happy eyeballs: all candidates failed");
    Err(last_err.unwrap_or_else(|| TunnelError::Network("no candidate addresses".to_string())))
}

fn settle<C>(
    res: Result<Result<C, TunnelError>, tokio::task::JoinError>,
    last_err: &mut Option<TunnelError>,
) -> Option<C> {
    match res {
        Ok(Ok(conn)) => Some(conn),
        Ok(Err(e)) => {
            *last_err = Some(e);
            None
        }
        Err(join_err) => {
            if !join_err.is_cancelled() {
                *last_err = Some(TunnelError::Network(join_err.to_string()));
            }
            None
        }
    }
}
