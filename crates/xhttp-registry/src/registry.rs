use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use xhttp_core::{StreamSettings, TunnelError};

use crate::dialer::TransportDialer;
use crate::listener::TransportListener;
use crate::settings;

/// C9: name → dialer/listener lookup, plus a cache that normalizes a raw
/// persisted configuration into a [`StreamSettings`] exactly once per
/// distinct raw blob.
#[derive(Default)]
pub struct TransportRegistry {
    dialers: DashMap<String, Arc<dyn TransportDialer>>,
    listeners: DashMap<String, Arc<dyn TransportListener>>,
    settings_cache: DashMap<String, StreamSettings>,
}

impl TransportRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialer under its own name, overwriting any prior
    /// registration for that name.
    pub fn register_dialer(&self, dialer: Arc<dyn TransportDialer>) {
        debug!(protocol = dialer.name(), "registering transport dialer");
        self.dialers.insert(dialer.name().to_string(), dialer);
    }

    /// Register a listener under its own name, overwriting any prior
    /// registration for that name.
    pub fn register_listener(&self, listener: Arc<dyn TransportListener>) {
        debug!(protocol = listener.name(), "registering transport listener");
        self.listeners.insert(listener.name().to_string(), listener);
    }

    /// Look up a previously registered dialer by protocol name.
    #[must_use]
    pub fn dialer(&self, name: &str) -> Option<Arc<dyn TransportDialer>> {
        self.dialers.get(name).map(|d| d.clone())
    }

    /// Look up a previously registered listener by protocol name.
    #[must_use]
    pub fn listener(&self, name: &str) -> Option<Arc<dyn TransportListener>> {
        self.listeners.get(name).map(|l| l.clone())
    }

    /// Normalize `raw` into a [`StreamSettings`], reusing a cached result if
    /// this exact blob (compared by its canonical JSON text) was normalized
    /// before.
    ///
    /// # Errors
    ///
    /// Propagates [`settings::normalize`]'s validation errors.
    pub fn effective_settings(&self, raw: &serde_json::Value) -> Result<StreamSettings, TunnelError> {
        let key = raw.to_string();
        if let Some(cached) = self.settings_cache.get(&key) {
            return Ok(cached.clone());
        }
        let normalized = settings::normalize(raw)?;
        self.settings_cache.insert(key, normalized.clone());
        Ok(normalized)
    }
}
