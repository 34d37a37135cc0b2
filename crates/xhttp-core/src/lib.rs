//! Shared ids, errors, padding, roll-ranges and stream settings for the
//! XHTTP tunnel core. Every other `xhttp-*` crate depends on this one.

pub mod error;
pub mod ids;
pub mod packet;
pub mod padding;
pub mod roll;
pub mod settings;

pub use error::{SessionFault, TimeoutKind, TunnelError};
pub use ids::{EmptySessionId, SessionId};
pub use packet::Packet;
pub use padding::PaddingRange;
pub use roll::RollRange;
pub use settings::{SecurityType, StreamSettings};
