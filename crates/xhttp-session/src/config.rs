use std::time::Duration;

/// Tunables for a [`crate::SessionTable`].
#[derive(Debug, Clone, Copy)]
pub struct SessionTableConfig {
    /// How long a session may sit without its download GET before the
    /// reaper closes it. Resolves the Open Question in spec.md §9: the
    /// fixed 30 s TTL is now configurable, default unchanged.
    pub reap_after: Duration,
}

impl Default for SessionTableConfig {
    fn default() -> Self {
        Self {
            reap_after: Duration::from_secs(30),
        }
    }
}
