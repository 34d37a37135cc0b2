use std::future::Future;
use std::pin::Pin;

use xhttp_core::TunnelError;

/// Supplies an HTTP client routed through a tagged outbound, so the
/// observatory can probe "through" a specific transport without knowing how
/// that transport is dialed (spec.md §1's named `dial_tagged` collaborator,
/// §4.8: "the observatory probes through it via `reqwest::Client` built on a
/// connector the dispatcher supplies").
pub trait Dispatcher: Send + Sync {
    /// A client whose connections are routed through `tag`'s outbound.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is unknown or the outbound cannot currently
    /// build a connector (e.g. its pool is unreachable).
    fn client_for<'a>(
        &'a self,
        tag: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<reqwest::Client, TunnelError>> + Send + 'a>>;
}

/// Chooses which outbound tags get probed on a given round. Injected into
/// [`crate::Observatory::start`] so the set of probed outbounds can change
/// over the process lifetime (tags added/removed from a routing config)
/// without restarting the scheduler.
pub trait OutboundSelector: Send + Sync {
    fn select(&self) -> Vec<String>;
}

/// An [`OutboundSelector`] over a fixed list, for simple deployments and
/// tests.
pub struct StaticSelector(Vec<String>);

impl StaticSelector {
    #[must_use]
    pub fn new(tags: Vec<String>) -> Self {
        Self(tags)
    }
}

impl OutboundSelector for StaticSelector {
    fn select(&self) -> Vec<String> {
        self.0.clone()
    }
}
