//! C8: periodic outbound health-ping scheduler with RTT bookkeeping
//! (spec §4.8).

mod config;
mod dispatcher;
mod observatory;
mod rtt;

pub use config::ObservatoryConfig;
pub use dispatcher::{Dispatcher, OutboundSelector, StaticSelector};
pub use observatory::{Observatory, Snapshot};
pub use rtt::{Delay, HealthStats, OutboundHealth, RttSentinel};
