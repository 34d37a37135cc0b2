use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::net::{TcpSocket, TcpStream};
use xhttp_core::TunnelError;

/// Opaque per-dial socket options (spec §3 `StreamSettings::socket_settings`).
pub type SockOpt = HashMap<String, serde_json::Value>;

/// The named `SystemDialer` collaborator from spec.md §1: `dial(src, dest,
/// sockopt) → Connection`. Boxed-future methods so the trait stays
/// object-safe for the racing code below.
pub trait SystemDialer: Send + Sync {
    /// The concrete connection type this dialer produces.
    type Connection: Send + Unpin + 'static;

    /// Dial `dest`, optionally binding the local end to `src` first.
    /// `sockopt` is an opaque blob the concrete dialer may interpret
    /// (e.g. `SO_MARK`, TTL, TOS); `TokioTcpDialer` ignores it.
    fn dial<'a>(
        &'a self,
        src: Option<SocketAddr>,
        dest: SocketAddr,
        sockopt: &'a SockOpt,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Connection, TunnelError>> + Send + 'a>>;
}

/// Default [`SystemDialer`]: a plain `tokio::net::TcpStream::connect`,
/// optionally binding a local source address first.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTcpDialer;

impl SystemDialer for TokioTcpDialer {
    type Connection = TcpStream;

    fn dial<'a>(
        &'a self,
        src: Option<SocketAddr>,
        dest: SocketAddr,
        _sockopt: &'a SockOpt,
    ) -> Pin<Box<dyn Future<Output = Result<TcpStream, TunnelError>> + Send + 'a>> {
        Box::pin(async move {
            match src {
                Some(bind_addr) => {
                    let socket = if bind_addr.is_ipv4() {
                        TcpSocket::new_v4()
                    } else {
                        TcpSocket::new_v6()
                    }
                    .map_err(|e| TunnelError::Network(e.to_string()))?;
                    socket
                        .bind(bind_addr)
                        .map_err(|e| TunnelError::Network(e.to_string()))?;
                    socket
                        .connect(dest)
                        .await
                        .map_err(|e| TunnelError::Network(e.to_string()))
                }
                None => TcpStream::connect(dest)
                    .await
                    .map_err(|e| TunnelError::Network(e.to_string())),
            }
        })
    }
}
