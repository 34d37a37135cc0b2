use std::future::Future;
use std::pin::Pin;

use xhttp_core::{StreamSettings, TunnelError};

use crate::dialer::TunnelIo;

/// A named, acceptable transport listener, the inbound counterpart to
/// [`crate::TransportDialer`].
pub trait TransportListener: Send + Sync {
    /// The protocol name this listener answers to lookups for.
    fn name(&self) -> &str;

    /// Accept the next inbound connection under the given settings.
    fn accept<'a>(
        &'a self,
        settings: &'a StreamSettings,
    ) -> Pin<Box<dyn Future<Output = Result<TunnelIo, TunnelError>> + Send + 'a>>;
}
