//! A `MuxManager<PooledCarrier>` fed by a `RaceDialer`, shared by the
//! upload pump and the download adopter (spec §4.4 step 2).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use xhttp_core::TunnelError;
use xhttp_mux::{CarrierHealth, MuxConfig, MuxError, MuxHandle, MuxManager};
use xhttp_race::{Carrier, H2Dial, H3Dial, RaceDialer};

/// A [`Carrier`] plus a locally-tracked closed flag, since `Carrier` itself
/// has no health signal `MuxManager` can poll — the flag is set here the
/// first time a request over it fails (see `crate::request::send`).
#[derive(Clone)]
pub struct PooledCarrier {
    pub carrier: Carrier,
    closed: Arc<AtomicBool>,
}

impl PooledCarrier {
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl CarrierHealth for PooledCarrier {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Obtains carriers keyed by authority: a pooled entry under `MuxManager`'s
/// caps, or a fresh one raced by `RaceDialer` (spec §4.5 `get(ctx)`).
pub struct CarrierPool<H3, H2> {
    mux: MuxManager<PooledCarrier>,
    race: RaceDialer<H3, H2>,
}

impl<H3, H2> CarrierPool<H3, H2>
where
    H3: H3Dial + 'static,
    H2: H2Dial + 'static,
{
    #[must_use]
    pub fn new(race: RaceDialer<H3, H2>, mux_config: MuxConfig) -> Self {
        Self {
            mux: MuxManager::new(mux_config),
            race,
        }
    }

    /// # Errors
    ///
    /// Propagates the race dialer's failure, wrapped as
    /// [`TunnelError::Network`].
    pub async fn get(&self, authority: &str) -> Result<(MuxHandle, PooledCarrier), TunnelError> {
        self.mux
            .get(|| async {
                let carrier = self
                    .race
                    .dial(authority)
                    .await
                    .map_err(|e| MuxError::Build(e.to_string()))?;
                Ok(PooledCarrier {
                    carrier,
                    closed: Arc::new(AtomicBool::new(false)),
                })
            })
            .await
            .map_err(|e| TunnelError::Network(e.to_string()))
    }

    pub fn release(&self, handle: MuxHandle) {
        self.mux.release(handle);
    }
}
