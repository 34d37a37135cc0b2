//! The `Packet` type carried by the upload queue (spec §3).

use bytes::Bytes;
use tokio::io::AsyncRead;

/// A single upload unit keyed by sequence number.
///
/// `Bounded` carries a fixed byte payload (packet-up mode); `Stream` carries
/// an indefinite reader (stream-up mode) and is always treated as if
/// `seq == next_seq`, consumed directly without re-queueing (spec §4.1).
pub enum Packet {
    /// A complete, length-known payload for a single `seq`.
    Bounded { seq: u64, payload: Bytes },
    /// An indefinite byte stream occupying a single `seq` slot.
    Stream {
        seq: u64,
        reader: Box<dyn AsyncRead + Send + Unpin>,
    },
}

impl Packet {
    /// The packet's sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        match self {
            Self::Bounded { seq, .. } | Self::Stream { seq, .. } => *seq,
        }
    }

    /// `true` for the stream-up variant.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded { seq, payload } => f
                .debug_struct("Packet::Bounded")
                .field("seq", seq)
                .field("len", &payload.len())
                .finish(),
            Self::Stream { seq, .. } => {
                f.debug_struct("Packet::Stream").field("seq", seq).finish()
            }
        }
    }
}
