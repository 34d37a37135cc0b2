//! Server-side tunnel session table (C2, spec §4.2).
//!
//! A session is reachable from the table or has had its queue closed, never
//! both lost and open. `upsert` is atomic get-or-create over a sharded map;
//! a freshly created session is given a reaper task that closes it if the
//! paired download GET never shows up.

mod config;
mod session;
mod table;

pub use config::SessionTableConfig;
pub use session::HttpSession;
pub use table::SessionTable;
