use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use xhttp_core::TunnelError;
use xhttp_dial::{HappyEyeballsConfig, SystemDialer, TokioTcpDialer, race_dial};

use crate::H2SendRequest;
use crate::dial::dial_h2;
use crate::race::H2Dial;

/// Default, TLS-less [`H2Dial`]: resolves `authority` (`host:port`) with the
/// system resolver, races the candidate addresses with Happy Eyeballs
/// (spec §4.7) when more than one comes back, then speaks H2 directly over
/// the winning TCP stream.
///
/// This is the plain-text (`h2c`) path — spec §1 names `TlsAdapter` as a
/// separate collaborator for TLS authorities, which a caller wires in by
/// implementing [`H2Dial`] itself (e.g. wrapping the stream this connector
/// would otherwise hand to `dial_h2` in a `rustls` client session first).
/// `SystemDialer.dial` (spec §1) is `TokioTcpDialer` here; callers that need
/// `SO_MARK`/TTL/source-bind control can swap it for their own impl.
pub struct TcpH2Dialer<D = TokioTcpDialer> {
    dialer: Arc<D>,
    config: HappyEyeballsConfig,
}

impl Default for TcpH2Dialer {
    fn default() -> Self {
        Self::new(Arc::new(TokioTcpDialer), HappyEyeballsConfig::default())
    }
}

impl<D> TcpH2Dialer<D>
where
    D: SystemDialer<Connection = tokio::net::TcpStream> + 'static,
{
    #[must_use]
    pub fn new(dialer: Arc<D>, config: HappyEyeballsConfig) -> Self {
        Self { dialer, config }
    }

    async fn connect(&self, authority: &str) -> Result<tokio::net::TcpStream, TunnelError> {
        let (host, port) = split_authority(authority)?;

        let mut addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| TunnelError::Network(e.to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(TunnelError::Network(format!("no addresses resolved for {authority}")));
        }

        if addrs.len() == 1 {
            let dest = addrs.remove(0);
            debug!(%authority, %dest, "single candidate, dialing directly");
            return self
                .dialer
                .dial(None, dest, &Default::default())
                .await;
        }

        let ips: Vec<_> = addrs.iter().map(SocketAddr::ip).collect();
        debug!(%authority, count = ips.len(), "racing candidates with happy eyeballs");
        race_dial(self.dialer.clone(), &ips, port, None, Default::default(), self.config).await
    }
}

impl<D> H2Dial for TcpH2Dialer<D>
where
    D: SystemDialer<Connection = tokio::net::TcpStream> + 'static,
{
    fn dial_h2<'a>(
        &'a self,
        authority: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(H2SendRequest, Duration), TunnelError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let stream = self.connect(authority).await?;
            dial_h2(stream).await
        })
    }
}

fn split_authority(authority: &str) -> Result<(&str, u16), TunnelError> {
    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| TunnelError::Network(format!("authority missing port: {authority}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| TunnelError::Network(format!("authority has non-numeric port: {authority}")))?;
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_authority("example.com:443").unwrap(), ("example.com", 443));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(split_authority("example.com").is_err());
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(split_authority("example.com:https").is_err());
    }

    #[tokio::test]
    async fn dial_h2_surfaces_resolution_failure() {
        let dialer = TcpH2Dialer::default();
        let err = dialer
            .dial_h2("this-host-does-not-resolve.invalid:443")
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::Network(_)));
    }
}
