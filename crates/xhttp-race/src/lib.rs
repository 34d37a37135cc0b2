//! H3-vs-H2 protocol race dialer with broken-endpoint memory (C6, spec §4.6).
//!
//! [`RaceDialer`] owns, per authority, a cached winning [`Carrier`] and a
//! shared in-flight race future: the first request to a fresh authority
//! races an H3 and an H2 handshake concurrently and caches the winner;
//! every subsequent request either reuses the cached carrier or, if one is
//! already racing, waits on that race's outcome instead of starting a
//! second one.

mod broken_window;
mod carrier;
mod connector;
mod dial;
mod race;
mod registry;

pub use broken_window::broken_window;
pub use carrier::{Carrier, H2SendRequest, H3SendRequest};
pub use connector::TcpH2Dialer;
pub use dial::{dial_h2, dial_h3};
pub use race::{H2Dial, H3Dial, RaceConfig, RaceDialer};
pub use registry::{EndpointInfo, RaceRegistry};
