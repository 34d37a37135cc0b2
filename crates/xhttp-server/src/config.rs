use xhttp_core::padding::PaddingRange;
use xhttp_core::roll::RollRange;

/// Which operating modes this mount accepts for the empty-session-id,
/// full-duplex request shape (spec §4.3 step 4: "only allowed when mode ∈
/// {auto, stream-one}"). The reassembled POST modes (stream-up, packet-up)
/// are always accepted once a session id is present; `mode` only gates
/// whether an empty session id is routed as stream-one or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XhttpMode {
    /// Accept stream-one requests (the default).
    #[default]
    Auto,
    /// Accept stream-one requests.
    StreamOne,
    /// Reject the empty-session-id shape; every request must carry a
    /// session id and use stream-up/packet-up.
    PacketUp,
}

/// Tunables for [`crate::XhttpServer`] (spec §4.3).
#[derive(Debug, Clone)]
pub struct XhttpServerConfig {
    /// Required `Host` header (port stripped before compare), case
    /// insensitive. `None` accepts any host.
    pub host: Option<String>,
    /// URL path prefix the router is mounted under. Always normalized to
    /// start and end with `/` (spec §6).
    pub path: String,
    /// Accepted `x_padding` length range.
    pub padding: PaddingRange,
    /// Packet-up body size cap; a POST over this by even one byte is 413.
    pub max_each_post_bytes: usize,
    /// If set and `> 0` on roll, a stream-up response gets periodic random
    /// padding keepalive writes on this cadence.
    pub stream_up_server_secs: Option<RollRange<u64>>,
    /// Suppresses `Content-Type: text/event-stream` on stream-down/stream-one
    /// responses when set.
    pub no_sse_header: bool,
    /// Whether an empty session-id segment is routed as stream-one
    /// (spec §4.3 step 4).
    pub mode: XhttpMode,
}

impl Default for XhttpServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            path: "/".to_string(),
            padding: PaddingRange { from: 0, to: 0 },
            max_each_post_bytes: 1_000_000,
            stream_up_server_secs: None,
            no_sse_header: false,
            mode: XhttpMode::default(),
        }
    }
}

impl XhttpServerConfig {
    /// `path` normalized to start and end with `/` (spec §6: "`normalized_path`
    /// always starts and ends with `/`").
    #[must_use]
    pub fn normalized_path(&self) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_normalizes_to_root() {
        let config = XhttpServerConfig {
            path: "".to_string(),
            ..Default::default()
        };
        assert_eq!(config.normalized_path(), "/");
    }

    #[test]
    fn path_gains_leading_and_trailing_slash() {
        let config = XhttpServerConfig {
            path: "tunnel".to_string(),
            ..Default::default()
        };
        assert_eq!(config.normalized_path(), "/tunnel/");
    }

    #[test]
    fn path_with_existing_slashes_is_idempotent() {
        let config = XhttpServerConfig {
            path: "/tunnel/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.normalized_path(), "/tunnel/");
    }
}
