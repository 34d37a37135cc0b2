//! Out-of-order upload packet reassembly (C1, spec §4.1).
//!
//! An [`UploadQueue`] is a bounded min-heap on `seq`: producers (POST
//! handlers) push packets in whatever order they arrive over the wire;
//! the single consumer (the adopted download GET) reads them back in
//! strict sequence order.

mod config;
mod error;
mod queue;

pub use config::UploadQueueConfig;
pub use error::{PushOutcome, QueueError};
pub use queue::UploadQueue;
