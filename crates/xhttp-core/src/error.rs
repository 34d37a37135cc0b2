//! Shared error taxonomy for the tunnel core (spec §7).

use thiserror::Error;

/// A session-fatal fault raised by the upload queue or session table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionFault {
    /// No session exists for the given id.
    #[error("no such session")]
    NotFound,
    /// A second stream-up POST arrived while one was already live.
    #[error("duplicate stream-up request")]
    DuplicateStreamUp,
    /// The upload queue exceeded `max_buffered_posts`.
    #[error("upload queue overflow")]
    QueueOverflow,
    /// A push or read was attempted after the queue was closed.
    #[error("upload queue closed")]
    QueueClosed,
}

/// What kind of operation timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeoutKind {
    /// A dial attempt did not complete in time.
    #[error("dial timed out")]
    Dial,
    /// The H3 first-byte watchdog fired (spec §4.6).
    #[error("h3 first-byte watchdog fired")]
    H3FirstByte,
}

/// The error taxonomy shared across the tunnel core, per spec §7.
///
/// `RaceInternal` (`lose_race` / `protocol_broken`) deliberately has no
/// variant here: it never escapes [`xhttp-race`](https://docs.rs) by design.
#[derive(Debug, Clone, Error)]
pub enum TunnelError {
    /// Bad host, path, padding, seq, or session-id shape.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Session-fatal, not retried.
    #[error("session error: {0}")]
    Session(#[from] SessionFault),
    /// Dial, read/write, or handshake failure; session is torn down.
    #[error("network error: {0}")]
    Network(String),
    /// A dial or watchdog timeout, surfaced as a network error per spec §7.
    #[error("timeout: {0}")]
    Timeout(TimeoutKind),
}

impl TunnelError {
    /// The HTTP status code this error maps to at the XhttpServer boundary
    /// (spec §4.3 routing table / §6 wire protocol).
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Session(SessionFault::NotFound) => 400,
            Self::Session(SessionFault::DuplicateStreamUp) => 409,
            Self::Session(SessionFault::QueueOverflow | SessionFault::QueueClosed) => 500,
            Self::Network(_) | Self::Timeout(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_spec_table() {
        assert_eq!(TunnelError::Validation("bad host".into()).http_status(), 400);
        assert_eq!(
            TunnelError::Session(SessionFault::DuplicateStreamUp).http_status(),
            409
        );
        assert_eq!(
            TunnelError::Session(SessionFault::QueueOverflow).http_status(),
            500
        );
    }
}
