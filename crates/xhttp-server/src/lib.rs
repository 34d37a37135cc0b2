//! C3: XHTTP request router — host/path/padding validation and dispatch
//! across the stream-down, stream-up, packet-up, and stream-one modes
//! (spec §4.3).

mod config;
mod conn;
mod handlers;
mod response;
mod router;
mod validate;

pub use config::{XhttpMode, XhttpServerConfig};
pub use conn::{BrowserDialerHandle, ConnSink, Connection};
pub use router::{AppState, router};
pub use validate::{RouteMatch, match_host, match_path, split_suffix, validate_padding};
