use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// The client-side half of a dialed XHTTP session (spec §4.4 step 6): a
/// size-exact upload adapter paired with the lazy download body. Dropping
/// either half does not cancel the other; `cancel` is the explicit shared
/// signal a mid-stream upload failure uses to tear down the paired
/// download (spec.md §4.4 supplement).
pub struct Connection {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub writer: Pin<Box<dyn AsyncWrite + Send>>,
    pub cancel: CancellationToken,
}
