use xhttp_core::{SessionFault, TunnelError};

/// What a successful [`crate::UploadQueue::push`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The packet was queued.
    Accepted,
    /// `seq < next_seq`: a duplicate or already-consumed packet, silently
    /// dropped per spec §3.
    StaleIgnored,
}

/// A fatal upload-queue fault. Once raised, the queue stays in this state
/// and every further `push`/`read` returns a clone of it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    /// `push` or `read` after `close()`.
    #[error("upload queue closed")]
    Closed,
    /// More than `max_buffered_posts` packets buffered at once.
    #[error("upload queue overflow")]
    Overflow,
    /// A `seq` arriving from the wire could not be parsed.
    #[error("malformed sequence number")]
    MalformedSeq,
    /// The stream-up reader returned an I/O error mid-read.
    #[error("stream read error: {0}")]
    Io(String),
}

impl From<QueueError> for TunnelError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => Self::Session(SessionFault::QueueClosed),
            QueueError::Overflow => Self::Session(SessionFault::QueueOverflow),
            QueueError::MalformedSeq => Self::Validation("malformed seq".to_string()),
            QueueError::Io(msg) => Self::Network(msg),
        }
    }
}
