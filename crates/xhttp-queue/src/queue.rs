use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;
use tracing::trace;
use xhttp_core::Packet;

use crate::config::UploadQueueConfig;
use crate::error::{PushOutcome, QueueError};

/// `Packet`, ordered by `seq` ascending so a [`BinaryHeap`] behaves as a
/// min-heap when driven through `std::cmp::Reverse`-free comparisons
/// (we flip the `Ord` impl itself instead, since `Packet` is otherwise
/// unordered and not `Copy`).
struct BySeq(Packet);

impl PartialEq for BySeq {
    fn eq(&self, other: &Self) -> bool {
        self.0.seq() == other.0.seq()
    }
}
impl Eq for BySeq {}
impl PartialOrd for BySeq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for BySeq {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest seq on top.
        other.0.seq().cmp(&self.0.seq())
    }
}

struct Inner {
    heap: BinaryHeap<BySeq>,
    next_seq: u64,
    closed: bool,
    fault: Option<QueueError>,
    max_buffered_posts: usize,
}

/// Bounded reorder buffer described in spec §4.1.
///
/// Single consumer, multiple producers. Producers call [`UploadQueue::push`]
/// from POST handlers in arrival order (not sequence order); the one
/// consumer calls [`UploadQueue::read`] to get bytes back in `seq` order.
pub struct UploadQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl UploadQueue {
    #[must_use]
    pub fn new(config: UploadQueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
                fault: None,
                max_buffered_posts: config.max_buffered_posts,
            }),
            notify: Notify::new(),
        }
    }

    /// Queue a packet. Packets with `seq < next_seq` are silently dropped
    /// (duplicate or already-consumed), per spec §3.
    ///
    /// # Errors
    ///
    /// Returns the queue's fatal fault if it has one, `Closed` if the queue
    /// was closed, or `Overflow` if this push pushed the buffered count past
    /// `max_buffered_posts` (which also latches the queue into the fault
    /// state for every subsequent call).
    pub fn push(&self, packet: Packet) -> Result<PushOutcome, QueueError> {
        let mut inner = self.inner.lock();
        if let Some(fault) = &inner.fault {
            return Err(fault.clone());
        }
        if inner.closed {
            return Err(QueueError::Closed);
        }
        if packet.seq() < inner.next_seq {
            trace!(seq = packet.seq(), next_seq = inner.next_seq, "stale packet dropped");
            return Ok(PushOutcome::StaleIgnored);
        }
        inner.heap.push(BySeq(packet));
        if inner.heap.len() > inner.max_buffered_posts {
            inner.heap.clear();
            inner.fault = Some(QueueError::Overflow);
            drop(inner);
            self.notify.notify_waiters();
            return Err(QueueError::Overflow);
        }
        drop(inner);
        self.notify.notify_waiters();
        Ok(PushOutcome::Accepted)
    }

    /// Read the next in-order bytes into `buf`, parking until they are
    /// available. Returns `Ok(0)` once the queue is closed and fully
    /// drained (EOF); any other `Ok(n)` is `n > 0`.
    ///
    /// # Errors
    ///
    /// Returns the queue's fatal fault, if one has been latched.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, QueueError> {
        loop {
            enum Popped {
                Bounded { seq: u64, payload: bytes::Bytes },
                Stream { seq: u64, reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> },
            }

            // Register for a notification *before* inspecting state: a
            // `Notified` future created here observes any `notify_waiters`
            // call from this point on, even ones landing before we `.await`
            // it below. Registering after the check would leave a window
            // where a concurrent push's wakeup is lost.
            let notified = self.notify.notified();

            let popped = {
                let mut inner = self.inner.lock();
                if let Some(fault) = &inner.fault {
                    return Err(fault.clone());
                }
                let ready = inner
                    .heap
                    .peek()
                    .is_some_and(|item| item.0.seq() == inner.next_seq);
                if ready {
                    let BySeq(packet) = inner.heap.pop().expect("peeked Some above");
                    Some(match packet {
                        Packet::Bounded { seq, payload } => Popped::Bounded { seq, payload },
                        Packet::Stream { seq, reader } => Popped::Stream { seq, reader },
                    })
                } else if inner.closed {
                    return Ok(0);
                } else {
                    None
                }
            };

            match popped {
                Some(Popped::Bounded { seq, payload }) => {
                    let n = buf.len().min(payload.len());
                    buf[..n].copy_from_slice(&payload[..n]);
                    let remaining = payload.slice(n..);
                    let mut inner = self.inner.lock();
                    if remaining.is_empty() {
                        inner.next_seq = seq + 1;
                    } else {
                        inner.heap.push(BySeq(Packet::Bounded {
                            seq,
                            payload: remaining,
                        }));
                    }
                    drop(inner);
                    self.notify.notify_waiters();
                    return Ok(n);
                }
                Some(Popped::Stream { seq, mut reader }) => {
                    let n = reader
                        .read(buf)
                        .await
                        .map_err(|e| QueueError::Io(e.to_string()))?;
                    if n == 0 {
                        let mut inner = self.inner.lock();
                        inner.next_seq = seq + 1;
                        drop(inner);
                        self.notify.notify_waiters();
                        // This reader is spent; loop to see if the next seq is ready.
                        continue;
                    }
                    let mut inner = self.inner.lock();
                    inner.heap.push(BySeq(Packet::Stream { seq, reader }));
                    drop(inner);
                    return Ok(n);
                }
                None => {
                    notified.await;
                }
            }
        }
    }

    /// Idempotent. Wakes any parked reader, which will observe EOF once the
    /// heap is drained.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn bounded(seq: u64, s: &str) -> Packet {
        Packet::Bounded {
            seq,
            payload: Bytes::copy_from_slice(s.as_bytes()),
        }
    }

    #[tokio::test]
    async fn s1_packet_up_reorder() {
        let q = UploadQueue::new(UploadQueueConfig::default());
        q.push(bounded(2, "C")).unwrap();
        q.push(bounded(0, "A")).unwrap();
        q.push(bounded(1, "B")).unwrap();

        let mut buf = [0u8; 3];
        let mut total = 0;
        while total < 3 {
            let n = q.read(&mut buf[total..]).await.unwrap();
            total += n;
        }
        assert_eq!(&buf, b"ABC");
    }

    #[tokio::test]
    async fn read_blocks_until_next_seq_pushed() {
        let q = std::sync::Arc::new(UploadQueue::new(UploadQueueConfig::default()));
        let q2 = q.clone();
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1];
            q2.read(&mut buf).await.unwrap();
            buf[0]
        });
        tokio::task::yield_now().await;
        q.push(bounded(0, "Z")).unwrap();
        assert_eq!(handle.await.unwrap(), b'Z');
    }

    #[tokio::test]
    async fn stale_seq_is_ignored_not_errored() {
        let q = UploadQueue::new(UploadQueueConfig::default());
        q.push(bounded(0, "A")).unwrap();
        let mut buf = [0u8; 1];
        q.read(&mut buf).await.unwrap();
        // seq 0 already consumed; re-push is stale.
        let outcome = q.push(bounded(0, "X")).unwrap();
        assert_eq!(outcome, PushOutcome::StaleIgnored);
    }

    #[tokio::test]
    async fn overflow_latches_fatal_error() {
        let config = UploadQueueConfig {
            max_buffered_posts: 2,
        };
        let q = UploadQueue::new(config);
        q.push(bounded(5, "A")).unwrap();
        q.push(bounded(6, "B")).unwrap();
        let err = q.push(bounded(7, "C")).unwrap_err();
        assert!(matches!(err, QueueError::Overflow));

        // The fault is sticky.
        let mut buf = [0u8; 1];
        let err2 = q.read(&mut buf).await.unwrap_err();
        assert!(matches!(err2, QueueError::Overflow));
    }

    #[tokio::test]
    async fn close_then_drain_yields_eof() {
        let q = UploadQueue::new(UploadQueueConfig::default());
        q.push(bounded(0, "A")).unwrap();
        q.close();

        let mut buf = [0u8; 1];
        let n = q.read(&mut buf).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf[0], b'A');

        let n2 = q.read(&mut buf).await.unwrap();
        assert_eq!(n2, 0);
    }

    #[tokio::test]
    async fn push_after_close_is_rejected() {
        let q = UploadQueue::new(UploadQueueConfig::default());
        q.close();
        let err = q.push(bounded(0, "A")).unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }

    #[tokio::test]
    async fn partial_read_of_bounded_packet_requeues_remainder() {
        let q = UploadQueue::new(UploadQueueConfig::default());
        q.push(bounded(0, "ABC")).unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(q.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], b'A');
        assert_eq!(q.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], b'B');
        assert_eq!(q.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], b'C');
    }

    #[tokio::test]
    async fn stream_up_packet_consumed_directly() {
        let q = UploadQueue::new(UploadQueueConfig::default());
        let reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> =
            Box::new(std::io::Cursor::new(b"hello".to_vec()));
        q.push(Packet::Stream { seq: 0, reader }).unwrap();

        let mut buf = [0u8; 5];
        let mut total = 0;
        while total < 5 {
            total += q.read(&mut buf[total..]).await.unwrap();
        }
        assert_eq!(&buf, b"hello");

        q.close();
        let mut scratch = [0u8; 1];
        assert_eq!(q.read(&mut scratch).await.unwrap(), 0);
    }
}
