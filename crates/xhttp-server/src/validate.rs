//! Request routing validation: host, path prefix, and padding (spec §4.3
//! steps 1-4).

use xhttp_core::padding;

use crate::config::XhttpServerConfig;

/// Outcome of [`match_host`]/[`match_path`]: both are plain pass/fail, no
/// error detail needed since a mismatch always maps to 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch {
    Ok,
    NotFound,
}

/// Case-insensitive, port-stripped `Host` compare against the configured
/// host (spec §4.3 step 1). `None` in config accepts any host.
#[must_use]
pub fn match_host(config: &XhttpServerConfig, host_header: Option<&str>) -> RouteMatch {
    let Some(expected) = &config.host else {
        return RouteMatch::Ok;
    };
    let Some(actual) = host_header else {
        return RouteMatch::NotFound;
    };
    let actual_host = actual.rsplit_once(':').map_or(actual, |(host, _port)| host);
    if actual_host.eq_ignore_ascii_case(expected) {
        RouteMatch::Ok
    } else {
        RouteMatch::NotFound
    }
}

/// Whether `request_path` starts with the configured, normalized path
/// prefix (spec §4.3 step 2).
#[must_use]
pub fn match_path(config: &XhttpServerConfig, request_path: &str) -> RouteMatch {
    if request_path.starts_with(&config.normalized_path()) {
        RouteMatch::Ok
    } else {
        RouteMatch::NotFound
    }
}

/// Splits the path suffix (after the matched prefix) into `session_id` and
/// an optional `seq` segment (spec §4.3 step 4).
#[must_use]
pub fn split_suffix(config: &XhttpServerConfig, request_path: &str) -> (String, Option<String>) {
    let prefix = config.normalized_path();
    let suffix = request_path.strip_prefix(&prefix).unwrap_or("");
    let mut parts = suffix.splitn(2, '/');
    let session_id = parts.next().unwrap_or("").to_string();
    let seq = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (session_id, seq)
}

/// Validates an `x_padding` query value's length against the configured
/// range (spec §4.3 step 3; rejects with 400, not 404).
#[must_use]
pub fn validate_padding(config: &XhttpServerConfig, padding_value: Option<&str>) -> bool {
    let len = padding_value.map_or(0, str::len);
    padding::is_valid_length(config.padding, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> XhttpServerConfig {
        XhttpServerConfig {
            host: Some("example.com".to_string()),
            path: "/tunnel".to_string(),
            padding: xhttp_core::PaddingRange { from: 100, to: 100 },
            ..Default::default()
        }
    }

    #[test]
    fn host_match_is_case_insensitive_and_ignores_port() {
        assert_eq!(match_host(&config(), Some("EXAMPLE.com:443")), RouteMatch::Ok);
    }

    #[test]
    fn host_mismatch_is_not_found() {
        assert_eq!(match_host(&config(), Some("evil.com")), RouteMatch::NotFound);
    }

    #[test]
    fn no_configured_host_accepts_anything() {
        let config = XhttpServerConfig::default();
        assert_eq!(match_host(&config, Some("anything")), RouteMatch::Ok);
        assert_eq!(match_host(&config, None), RouteMatch::Ok);
    }

    #[test]
    fn path_prefix_must_match_normalized_form() {
        assert_eq!(match_path(&config(), "/tunnel/abc123"), RouteMatch::Ok);
        assert_eq!(match_path(&config(), "/other/abc123"), RouteMatch::NotFound);
    }

    #[test]
    fn suffix_splits_session_and_seq() {
        let (id, seq) = split_suffix(&config(), "/tunnel/abc123/42");
        assert_eq!(id, "abc123");
        assert_eq!(seq.as_deref(), Some("42"));
    }

    #[test]
    fn suffix_with_no_seq_is_stream_up_shape() {
        let (id, seq) = split_suffix(&config(), "/tunnel/abc123");
        assert_eq!(id, "abc123");
        assert_eq!(seq, None);
    }

    #[test]
    fn empty_suffix_is_stream_one_shape() {
        let (id, seq) = split_suffix(&config(), "/tunnel/");
        assert_eq!(id, "");
        assert_eq!(seq, None);
    }

    #[test]
    fn s3_padding_range_scenario() {
        let config = config();
        assert!(validate_padding(&config, Some(&"0".repeat(100))));
        assert!(!validate_padding(&config, Some(&"0".repeat(99))));
        assert!(!validate_padding(&config, None));
    }
}
