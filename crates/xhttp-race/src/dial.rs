use std::future::poll_fn;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use xhttp_core::TunnelError;

use crate::carrier::{H2SendRequest, H3SendRequest};

/// Perform an H2 handshake over an already-connected (and, for TLS
/// authorities, already wrapped) stream, spawning its connection driver.
///
/// `TlsAdapter.wrap_client` (spec §1) is the caller's job; this function
/// only speaks H2 framing on whatever stream it is handed.
pub async fn dial_h2<IO>(io: IO) -> Result<(H2SendRequest, Duration), TunnelError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let start = Instant::now();
    let (send_request, connection) = h2::client::handshake(io)
        .await
        .map_err(|e| TunnelError::Network(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "h2 connection driver exited");
        }
    });
    Ok((send_request, start.elapsed()))
}

/// Perform an H3 handshake over a pre-configured QUIC endpoint (its
/// `ClientConfig` already carries the negotiated `rustls::ClientConfig`
/// with `h3` ALPN).
pub async fn dial_h3(
    endpoint: &quinn::Endpoint,
    server_addr: SocketAddr,
    server_name: &str,
) -> Result<(H3SendRequest, Duration), TunnelError> {
    let start = Instant::now();
    let connecting = endpoint
        .connect(server_addr, server_name)
        .map_err(|e| TunnelError::Network(e.to_string()))?;
    let quinn_conn = connecting
        .await
        .map_err(|e| TunnelError::Network(e.to_string()))?;
    let h3_conn = h3_quinn::Connection::new(quinn_conn);
    let (mut driver, send_request) = h3::client::new(h3_conn)
        .await
        .map_err(|e| TunnelError::Network(e.to_string()))?;
    tokio::spawn(async move {
        let _ = poll_fn(|cx| driver.poll_close(cx)).await;
    });
    Ok((send_request, start.elapsed()))
}
