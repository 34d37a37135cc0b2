//! `XhttpClientConfig` (spec §4.4 supplement): shaped like the teacher's
//! `StreamableHttpClientConfig` plus the XHTTP-specific upload/padding
//! knobs from spec.md's §4.4/§4.5 tables.

use std::collections::HashMap;
use std::time::Duration;

use xhttp_core::{PaddingRange, RollRange};

/// Tunables for a dialed [`crate::XhttpClient`].
#[derive(Debug, Clone)]
pub struct XhttpClientConfig {
    /// Scheme + authority, e.g. `"https://example.com:443"`. No trailing
    /// slash or path.
    pub base_url: String,
    /// Mount path on the remote `XhttpServer`, normalized to a leading and
    /// trailing slash.
    pub path: String,
    /// Per-request timeout (enforced by the caller around `dial`/reads;
    /// the carrier layer itself has no built-in deadline).
    pub timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// `x_padding` length bounds, rolled fresh per request.
    pub padding: PaddingRange,
    /// Byte capacity of the upload pipe; a single write larger than this
    /// is split across multiple `read`s by the pump (spec §4.4 step 4/6).
    pub max_upload_size: usize,
    /// Concurrent in-flight packet-up POSTs, rolled once per dial.
    pub sc_max_concurrent_posts: RollRange<usize>,
    /// Minimum gap between successive POST dispatches, in milliseconds.
    pub sc_min_posts_interval_ms: RollRange<u64>,
    /// Max bytes batched into a single packet-up POST body.
    pub sc_max_each_post_bytes: usize,
}

impl Default for XhttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1:443".to_string(),
            path: "/".to_string(),
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
            user_agent: format!("xhttp-client/{}", env!("CARGO_PKG_VERSION")),
            padding: PaddingRange { from: 0, to: 64 },
            max_upload_size: 1_000_000,
            sc_max_concurrent_posts: RollRange::constant(10),
            sc_min_posts_interval_ms: RollRange::constant(30),
            sc_max_each_post_bytes: 1_000_000,
        }
    }
}

impl XhttpClientConfig {
    /// `path` with a leading and trailing slash guaranteed.
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
        let config = XhttpClientConfig {
            path: String::new(),
            ..Default::default()
        };
        assert_eq!(config.normalized_path(), "/");
    }

    #[test]
    fn path_gains_leading_and_trailing_slash() {
        let config = XhttpClientConfig {
            path: "tunnel".to_string(),
            ..Default::default()
        };
        assert_eq!(config.normalized_path(), "/tunnel/");
    }
}
