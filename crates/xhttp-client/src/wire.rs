//! Shared HTTP request construction for the packet-up and download paths.

use bytes::Bytes;
use xhttp_core::TunnelError;

use crate::config::XhttpClientConfig;

/// Builds an absolute-form request so the carrier layer can derive
/// `:authority` straight from the URI (spec §6 wire protocol: path layout
/// plus the `x_padding` query).
pub fn build_request(
    method: &str,
    url: &str,
    body: Bytes,
    config: &XhttpClientConfig,
) -> Result<http::Request<Bytes>, TunnelError> {
    let mut builder = http::Request::builder()
        .method(method)
        .uri(url)
        .header(http::header::USER_AGENT, config.user_agent.as_str());
    for (key, value) in &config.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder.body(body).map_err(|e| TunnelError::Validation(e.to_string()))
}
