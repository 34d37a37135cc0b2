use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use xhttp_core::TunnelError;
use xhttp_race::{H2Dial, H3Dial};

use crate::config::XhttpClientConfig;
use crate::pool::CarrierPool;
use crate::request;
use crate::upload::PostSink;
use crate::wire::build_request;

/// The production [`PostSink`]: dispatches through a pooled carrier.
pub struct CarrierPostSink<H3, H2> {
    pub pool: Arc<CarrierPool<H3, H2>>,
    pub authority: String,
    pub base_url: String,
    pub config: Arc<XhttpClientConfig>,
}

impl<H3, H2> PostSink for CarrierPostSink<H3, H2>
where
    H3: H3Dial + 'static,
    H2: H2Dial + 'static,
{
    fn post<'a>(&'a self, seq: u64, body: Bytes) -> Pin<Box<dyn Future<Output = Result<(), TunnelError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}?x_padding={}",
                self.base_url,
                seq,
                xhttp_core::padding::generate(self.config.padding)
            );
            let http_request = build_request("POST", &url, body, &self.config)?;

            let (handle, carrier) = self.pool.get(&self.authority).await?;
            let result = request::send(&carrier, http_request).await;
            self.pool.release(handle);
            let response = result?;

            if response.status >= 400 {
                return Err(TunnelError::Network(format!("packet-up post failed with status {}", response.status)));
            }
            Ok(())
        })
    }
}
