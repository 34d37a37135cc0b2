//! C4: the dial protocol itself (spec §4.4 steps 1-6).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use xhttp_core::{SessionId, TunnelError};
use xhttp_mux::MuxConfig;
use xhttp_race::{H2Dial, H3Dial, RaceDialer};

use crate::config::XhttpClientConfig;
use crate::connection::Connection;
use crate::download;
use crate::pool::CarrierPool;
use crate::sink::CarrierPostSink;
use crate::upload::UploadPump;

/// Dials a fresh XHTTP session against one configured remote.
pub struct XhttpClient<H3, H2> {
    config: Arc<XhttpClientConfig>,
    pool: Arc<CarrierPool<H3, H2>>,
    authority: String,
    request_url: String,
}

impl<H3, H2> XhttpClient<H3, H2>
where
    H3: H3Dial + 'static,
    H2: H2Dial + 'static,
{
    /// # Errors
    ///
    /// Returns [`TunnelError::Validation`] if `config.base_url` does not
    /// parse as `scheme://host[:port]`.
    pub fn new(config: XhttpClientConfig, race: RaceDialer<H3, H2>, mux_config: MuxConfig) -> Result<Self, TunnelError> {
        let parsed = url::Url::parse(&config.base_url).map_err(|e| TunnelError::Validation(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| TunnelError::Validation("base_url has no host".to_string()))?;
        let port = parsed.port_or_known_default().unwrap_or(443);
        let authority = format!("{host}:{port}");
        let request_url = format!("{}{}", config.base_url.trim_end_matches('/'), config.normalized_path());

        Ok(Self {
            config: Arc::new(config),
            pool: Arc::new(CarrierPool::new(race, mux_config)),
            authority,
            request_url,
        })
    }

    /// Runs the dial protocol end to end: allocates a session id, starts
    /// the upload pump, and opens the download body (spec §4.4 steps 3-6).
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Network`] if the initial download GET fails;
    /// upload failures surface afterwards through the returned
    /// connection's `cancel` token rather than this call.
    pub async fn dial(&self) -> Result<Connection, TunnelError> {
        let session_id = SessionId::new();
        let base_url = format!("{}{session_id}", self.request_url);
        let cancel = CancellationToken::new();

        let sink = Arc::new(CarrierPostSink {
            pool: self.pool.clone(),
            authority: self.authority.clone(),
            base_url: base_url.clone(),
            config: self.config.clone(),
        });
        let writer = UploadPump::spawn(sink, self.config.clone(), cancel.clone());
        let reader = download::open_download(&self.pool, &self.authority, &base_url, &self.config, cancel.clone()).await?;

        Ok(Connection { reader, writer, cancel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_joins_base_and_normalized_path() {
        let config = XhttpClientConfig {
            base_url: "https://example.com:8443".to_string(),
            path: "tunnel".to_string(),
            ..Default::default()
        };
        assert_eq!(
            format!("{}{}", config.base_url.trim_end_matches('/'), config.normalized_path()),
            "https://example.com:8443/tunnel/"
        );
    }
}
