//! Normalized `StreamSettings` (spec §3): produced once per configuration
//! from a persisted form, consumed everywhere downstream in this shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Security layer selection for a dialed connection. TLS/REALITY handshakes
/// themselves are an external collaborator (spec §1); this only records
/// which one a [`StreamSettings`] asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SecurityType {
    /// No transport security.
    #[default]
    None,
    /// Standard TLS.
    Tls,
    /// The REALITY handshake variant.
    Reality,
}

/// Normalized, process-ready stream configuration.
///
/// `protocol_settings` and `security_settings` are opaque to the core (the
/// concrete obfuscation/TLS collaborators own their shapes); the core only
/// needs to know which named protocol/security layer is selected and pass
/// the blob through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Name of the wire protocol (`"xhttp"`, `"raw"`, ...).
    pub protocol_name: String,
    /// Opaque per-protocol settings blob.
    pub protocol_settings: HashMap<String, serde_json::Value>,
    /// Which security layer, if any.
    pub security_type: SecurityType,
    /// Opaque per-security-layer settings blob.
    pub security_settings: HashMap<String, serde_json::Value>,
    /// Opaque socket option blob, handed to `SystemDialer` as `sockopt`.
    pub socket_settings: HashMap<String, serde_json::Value>,
}

impl StreamSettings {
    /// A bare XHTTP-over-plain-TCP settings value, useful in tests and as a
    /// starting point for builders.
    #[must_use]
    pub fn xhttp_plain() -> Self {
        Self {
            protocol_name: "xhttp".to_string(),
            protocol_settings: HashMap::new(),
            security_type: SecurityType::None,
            security_settings: HashMap::new(),
            socket_settings: HashMap::new(),
        }
    }

    /// Whether a TLS-family security layer is selected.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        !matches!(self.security_type, SecurityType::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_settings_are_not_secure() {
        assert!(!StreamSettings::xhttp_plain().is_secure());
    }

    #[test]
    fn tls_settings_are_secure() {
        let mut s = StreamSettings::xhttp_plain();
        s.security_type = SecurityType::Tls;
        assert!(s.is_secure());
    }
}
