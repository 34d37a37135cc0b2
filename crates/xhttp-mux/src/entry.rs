use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// What a pooled carrier must expose so [`crate::MuxManager`] can decide
/// when it is no longer usable.
pub trait CarrierHealth: Clone + Send + Sync + 'static {
    /// Whether the underlying transport has been closed (by either side).
    fn is_closed(&self) -> bool;
}

/// One pooled carrier plus its usage accounting (spec §3 `MuxEntry`).
pub(crate) struct MuxEntryState<C> {
    pub(crate) carrier: C,
    pub(crate) open_requests: AtomicI64,
    pub(crate) left_usage: i32,
    pub(crate) expiration: Option<Instant>,
    pub(crate) left_requests: AtomicI64,
}

impl<C: CarrierHealth> MuxEntryState<C> {
    /// Whether this entry should be dropped from the pool outright (spec
    /// §3: "An entry is retired when any of: carrier closed, left_usage ==
    /// 0, now > expiration, left_requests ≤ 0").
    pub(crate) fn is_retired(&self, now: Instant) -> bool {
        self.carrier.is_closed()
            || self.left_usage == 0
            || self.expiration.is_some_and(|exp| now > exp)
            || self.left_requests.load(Ordering::Relaxed) <= 0
    }

    /// Whether this entry can currently accept one more concurrent request.
    pub(crate) fn has_concurrency(&self, max_concurrency: Option<i64>) -> bool {
        match max_concurrency {
            Some(cap) => self.open_requests.load(Ordering::Relaxed) < cap,
            None => true,
        }
    }
}
