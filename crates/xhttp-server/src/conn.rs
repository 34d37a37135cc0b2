use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// A split, adopted XHTTP connection (spec §4.3: "The resulting Connection
/// is handed to `add_conn`"). Reader and writer are independent halves, torn
/// down together through `cancel` per spec §7's propagation policy ("both
/// halves of a splitConn are closed").
pub struct Connection {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub writer: Pin<Box<dyn AsyncWrite + Send>>,
    pub cancel: CancellationToken,
}

/// The upward callback into the proxy core that owns what happens to an
/// adopted connection (spec §4.3's `add_conn`). Not implemented here: this
/// router's job ends at handing off a `Connection`.
pub trait ConnSink: Send + Sync {
    fn add_conn<'a>(&'a self, conn: Connection) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// The named external collaborator (spec §4.4, §6) that funnels HTTP I/O
/// through a browser's WebSocket control channel. Registered at process
/// startup; the client selects this carrier kind only when one is present.
/// The RPC itself is out of scope, same as TLS/REALITY.
pub trait BrowserDialerHandle: Send + Sync {
    fn is_registered(&self) -> bool;
}
