//! Session identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque textual identifier for a tunnel session, unique process-wide for
/// the lifetime of the tunnel.
///
/// Produced as a UUIDv4 by [`SessionId::new`], but any non-empty string that
/// survives a URL path segment round-trip is accepted via [`FromStr`] so the
/// server can key sessions off whatever the client actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the underlying textual id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a path segment cannot be used as a [`SessionId`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("empty session id")]
pub struct EmptySessionId;

impl FromStr for SessionId {
    type Err = EmptySessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(EmptySessionId)
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn empty_string_rejected() {
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn round_trips_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
