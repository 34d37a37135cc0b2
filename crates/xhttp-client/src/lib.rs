//! C4: `XhttpClient` — dials a fresh XHTTP session by pairing an upload
//! pump with a download adopter under one session id (spec §4.4).

mod config;
mod connection;
mod dial;
mod download;
mod pool;
mod request;
mod sink;
mod upload;
mod wire;

pub use config::XhttpClientConfig;
pub use connection::Connection;
pub use dial::XhttpClient;
pub use pool::{CarrierPool, PooledCarrier};
pub use upload::{PostSink, UploadPump};
