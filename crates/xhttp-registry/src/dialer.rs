use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use xhttp_core::{StreamSettings, TunnelError};

/// A boxed, type-erased duplex byte stream: the common currency between a
/// registered transport's dial result and whatever sits above it (TLS
/// wrapping, H2/H3 handshake, raw framing).
pub type TunnelIo = Box<dyn AsyncReadWrite>;

/// Supertrait bundling the bounds every transport's connection type needs
/// to flow through the core as a [`TunnelIo`].
pub trait AsyncReadWrite: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncReadWrite for T {}

/// A named, dialable transport (e.g. `"xhttp"`, `"raw"`, `"grpc"`).
///
/// Concrete obfuscation/TLS collaborators (spec §1) are not implemented
/// here; a registered dialer is expected to call out to them itself and
/// hand back a plain duplex stream.
pub trait TransportDialer: Send + Sync {
    /// The protocol name this dialer answers to lookups for.
    fn name(&self) -> &str;

    /// Dial a connection using the given normalized settings.
    fn dial<'a>(
        &'a self,
        settings: &'a StreamSettings,
    ) -> Pin<Box<dyn Future<Output = Result<TunnelIo, TunnelError>> + Send + 'a>>;
}
