//! RFC 8305 Happy Eyeballs TCP racing across a mixed IPv4/IPv6 address list
//! (C7, spec §4.7).

mod eyeballs;
mod system_dialer;

pub use eyeballs::{HappyEyeballsConfig, race_dial};
pub use system_dialer::{SystemDialer, TokioTcpDialer};
