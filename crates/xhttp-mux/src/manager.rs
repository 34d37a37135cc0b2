use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::MuxConfig;
use crate::entry::{CarrierHealth, MuxEntryState};
use crate::error::MuxError;

/// Sentinel meaning "never decrements / has no finite cap" for the
/// `left_usage`/`left_requests` counters.
const UNLIMITED_USAGE: i32 = i32::MAX;
const UNLIMITED_REQUESTS: i64 = i64::MAX;

/// A handle to a pooled carrier: an arena index plus a generation tag, so a
/// handle outliving its entry's retirement is detected rather than
/// silently aliasing a different carrier (spec.md §9 "Arena + indices over
/// back-pointers").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxHandle {
    index: usize,
    generation: u64,
}

struct Slot<C> {
    generation: u64,
    entry: Option<MuxEntryState<C>>,
}

struct Arena<C> {
    slots: Vec<Slot<C>>,
    free: Vec<usize>,
}

impl<C> Arena<C> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, entry: MuxEntryState<C>) -> MuxHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.entry = Some(entry);
            MuxHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            MuxHandle {
                index,
                generation: 0,
            }
        }
    }

    fn retire(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index)
            && slot.entry.take().is_some()
        {
            self.free.push(index);
        }
    }
}

/// C5: a pool of carriers sharing one `(destination, stream_settings)` key,
/// bounded by reuse/lifetime/concurrency caps (spec §4.5).
///
/// Generic over the caller's carrier type so this crate stays decoupled
/// from how a carrier is actually dialed (`xhttp-race`, a raw H1 socket
/// pool, or a browser-dialer handle all qualify).
pub struct MuxManager<C> {
    arena: Mutex<Arena<C>>,
    config: MuxConfig,
}

impl<C: CarrierHealth> MuxManager<C> {
    #[must_use]
    pub fn new(config: MuxConfig) -> Self {
        Self {
            arena: Mutex::new(Arena::new()),
            config,
        }
    }

    /// Number of live (non-retired) entries. For tests/observability.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.lock().slots.iter().filter(|s| s.entry.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Obtain a carrier: reuse a pooled entry under the configured caps, or
    /// call `build` to create a fresh one (spec §4.5 `get(ctx)` algorithm).
    ///
    /// # Errors
    ///
    /// Propagates `build`'s error, wrapped as [`MuxError::Build`].
    pub async fn get<F, Fut>(&self, build: F) -> Result<(MuxHandle, C), MuxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, MuxError>>,
    {
        let now = Instant::now();

        // Step 1: compact — drop closed/expired/exhausted entries.
        let selected = {
            let mut arena = self.arena.lock();
            let retiring: Vec<usize> = arena
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| {
                    slot.entry
                        .as_ref()
                        .is_some_and(|e| e.is_retired(now))
                        .then_some(i)
                })
                .collect();
            for index in retiring {
                trace!(index, "mux: retiring entry");
                arena.retire(index);
            }

            let live_count = arena.slots.iter().filter(|s| s.entry.is_some()).count();

            // Step 2/3: empty pool, or still under the connection cap -> create.
            let must_create = live_count == 0
                || self
                    .config
                    .max_connections
                    .is_some_and(|range| live_count < range.roll().max(1));

            if must_create {
                None
            } else {
                // Step 4: filter by concurrency headroom.
                let max_concurrency = self.config.max_concurrency.map(|r| r.roll() as i64);
                let candidates: Vec<usize> = arena
                    .slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, slot)| {
                        slot.entry
                            .as_ref()
                            .is_some_and(|e| e.has_concurrency(max_concurrency))
                            .then_some(i)
                    })
                    .collect();

                if candidates.is_empty() {
                    None
                } else {
                    // Step 5: pick uniformly at random among eligible entries.
                    let pick = candidates[fastrand::usize(..candidates.len())];
                    let entry = arena.slots[pick].entry.as_mut().expect("filtered above");
                    entry.open_requests.fetch_add(1, Ordering::Relaxed);
                    if entry.left_usage != UNLIMITED_USAGE {
                        entry.left_usage -= 1;
                    }
                    Some((
                        MuxHandle {
                            index: pick,
                            generation: arena.slots[pick].generation,
                        },
                        entry.carrier.clone(),
                    ))
                }
            }
        };

        if let Some((handle, carrier)) = selected {
            trace!(index = handle.index, "mux: reusing pooled carrier");
            return Ok((handle, carrier));
        }

        debug!("mux: creating a new carrier");
        let carrier = build().await?;
        let entry = MuxEntryState {
            carrier: carrier.clone(),
            open_requests: 1.into(),
            // The creation itself is this entry's first handout, so it
            // already consumes one reuse before any `release`/reuse cycle.
            left_usage: self
                .config
                .max_reuse_times
                .map_or(UNLIMITED_USAGE, |r| (r.roll().max(1) - 1).max(0)),
            expiration: self
                .config
                .max_lifetime_ms
                .map(|r| now + Duration::from_millis(r.roll())),
            left_requests: self
                .config
                .max_request_times
                .map_or(UNLIMITED_REQUESTS, |r| r.roll().max(1) as i64)
                .into(),
        };
        let handle = self.arena.lock().insert(entry);
        Ok((handle, carrier))
    }

    /// Release a carrier borrowed from [`Self::get`] after its request
    /// completes, decrementing `open_requests` and `left_requests`.
    ///
    /// A stale handle (its entry already retired) is a silent no-op: the
    /// entry is already gone from the pool, there's nothing to release.
    pub fn release(&self, handle: MuxHandle) {
        let arena = self.arena.lock();
        let Some(slot) = arena.slots.get(handle.index) else {
            return;
        };
        if slot.generation != handle.generation {
            return;
        }
        if let Some(entry) = &slot.entry {
            entry.open_requests.fetch_sub(1, Ordering::Relaxed);
            entry.left_requests.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[derive(Clone)]
    struct MockCarrier {
        closed: Arc<AtomicBool>,
    }

    impl CarrierHealth for MockCarrier {
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Relaxed)
        }
    }

    fn fresh_carrier() -> MockCarrier {
        MockCarrier {
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn s4_reuse_cap_yields_exactly_three_creations() {
        // S4: c_max_reuse_times = {2,2}, max_connections = {1,1}, 6 dials -> 3 creations.
        use xhttp_core::RollRange;
        let config = MuxConfig {
            max_connections: Some(RollRange::constant(1)),
            max_reuse_times: Some(RollRange::constant(2)),
            ..Default::default()
        };
        let manager = MuxManager::<MockCarrier>::new(config);
        let creations = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        for _ in 0..6 {
            let creations = creations.clone();
            let (handle, _carrier) = manager
                .get(|| {
                    let creations = creations.clone();
                    async move {
                        creations.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, MuxError>(fresh_carrier())
                    }
                })
                .await
                .unwrap();
            manager.release(handle);
        }

        assert_eq!(creations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn closed_carrier_is_not_reused() {
        let manager = MuxManager::<MockCarrier>::new(MuxConfig::default());
        let (handle, carrier) = manager
            .get(|| async { Ok::<_, MuxError>(fresh_carrier()) })
            .await
            .unwrap();
        manager.release(handle);
        carrier.closed.store(true, Ordering::SeqCst);

        let (_handle2, carrier2) = manager
            .get(|| async { Ok::<_, MuxError>(fresh_carrier()) })
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&carrier.closed, &carrier2.closed));
    }

    #[tokio::test]
    async fn concurrency_cap_excludes_busy_entries_from_selection() {
        use xhttp_core::RollRange;
        let config = MuxConfig {
            max_concurrency: Some(RollRange::constant(1)),
            ..Default::default()
        };
        let manager = MuxManager::<MockCarrier>::new(config);
        let (h1, c1) = manager
            .get(|| async { Ok::<_, MuxError>(fresh_carrier()) })
            .await
            .unwrap();
        // h1 still open (not released): at max_concurrency, so a second get()
        // must create a new carrier rather than reuse it.
        let (_h2, c2) = manager
            .get(|| async { Ok::<_, MuxError>(fresh_carrier()) })
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&c1.closed, &c2.closed));
        manager.release(h1);
    }

    #[tokio::test]
    async fn stale_handle_release_is_a_harmless_no_op() {
        let manager = MuxManager::<MockCarrier>::new(MuxConfig::default());
        let (handle, _carrier) = manager
            .get(|| async { Ok::<_, MuxError>(fresh_carrier()) })
            .await
            .unwrap();
        manager.release(handle);
        manager.release(handle); // double release: harmless, no underflow panic path
    }
}
