//! Upload pump (spec §4.4 step 4): reads batches off a size-limited pipe,
//! throttles them through a concurrency cap and an inter-request gap, and
//! dispatches each batch as a packet-up POST.
//!
//! POST dispatch is abstracted behind [`PostSink`] rather than wired
//! directly to [`crate::pool::CarrierPool`], so the "a mid-stream POST
//! failure cancels the paired download" invariant is testable without a
//! real carrier.
//!
//! A failed POST cancels the shared token and the read loop exits on its
//! next iteration, dropping its half of the duplex pipe — the paired
//! writer then sees a broken pipe on its next write, matching spec §4.4
//! step 4's "on any POST error, the pipe is interrupted".

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWrite, DuplexStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use xhttp_core::TunnelError;

use crate::config::XhttpClientConfig;

/// Dispatches one packet-up POST for a given sequence number and body.
pub trait PostSink: Send + Sync + 'static {
    fn post<'a>(&'a self, seq: u64, body: Bytes) -> Pin<Box<dyn Future<Output = Result<(), TunnelError>> + Send + 'a>>;
}

/// Owns the background task that drains the upload pipe.
pub struct UploadPump;

impl UploadPump {
    /// Spawns the pump and returns the writer half handed to the caller as
    /// `Connection::writer`. The pipe capacity is `max_upload_size - 1`
    /// (spec §4.4 step 4); a single oversized write is simply split across
    /// multiple pipe reads rather than rejected.
    #[must_use]
    pub fn spawn(
        sink: Arc<dyn PostSink>,
        config: Arc<XhttpClientConfig>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn AsyncWrite + Send>> {
        let pipe_capacity = config.max_upload_size.saturating_sub(1).max(1);
        let (write_half, read_half) = tokio::io::duplex(pipe_capacity);
        tokio::spawn(Self::run(sink, config, read_half, cancel));
        Box::pin(write_half)
    }

    async fn run(sink: Arc<dyn PostSink>, config: Arc<XhttpClientConfig>, mut read_half: DuplexStream, cancel: CancellationToken) {
        let permits = config.sc_max_concurrent_posts.roll().max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let seq = AtomicU64::new(0);
        let last_dispatch: Mutex<Option<Instant>> = Mutex::new(None);
        let mut buf = vec![0u8; config.sc_max_each_post_bytes.max(1)];

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let n = match read_half.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);

            let gap = Duration::from_millis(config.sc_min_posts_interval_ms.roll());
            let sleep_for = {
                let mut last = last_dispatch.lock();
                let now = Instant::now();
                let sleep_for = last.map_or(Duration::ZERO, |prev| gap.saturating_sub(now.duration_since(prev)));
                *last = Some(now + sleep_for);
                sleep_for
            };
            if !sleep_for.is_zero() {
                tokio::time::sleep(sleep_for).await;
            }

            // Assigned at dispatch time, synchronously, so concurrent POSTs
            // still carry strictly increasing sequence numbers even though
            // they may complete out of order (spec §4.4 "upload ordering").
            let this_seq = seq.fetch_add(1, Ordering::SeqCst);
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let sink = sink.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = sink.post(this_seq, chunk).await {
                    warn!(seq = this_seq, error = %err, "packet-up post failed, tearing down session");
                    cancel.cancel();
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use xhttp_core::RollRange;

    use super::*;

    struct FailingSink {
        calls: Arc<AtomicUsize>,
    }

    impl PostSink for FailingSink {
        fn post<'a>(&'a self, _seq: u64, _body: Bytes) -> Pin<Box<dyn Future<Output = Result<(), TunnelError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(TunnelError::Network("connection reset".to_string())) })
        }
    }

    struct CountingSink {
        calls: Arc<AtomicUsize>,
    }

    impl PostSink for CountingSink {
        fn post<'a>(&'a self, _seq: u64, _body: Bytes) -> Pin<Box<dyn Future<Output = Result<(), TunnelError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    fn fast_config() -> Arc<XhttpClientConfig> {
        Arc::new(XhttpClientConfig {
            sc_min_posts_interval_ms: RollRange::constant(0),
            sc_max_each_post_bytes: 64,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn mid_stream_post_failure_cancels_the_paired_download() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(FailingSink { calls: calls.clone() });
        let cancel = CancellationToken::new();

        let mut writer = UploadPump::spawn(sink, fast_config(), cancel.clone());
        writer.write_all(b"hello").await.unwrap();
        drop(writer);

        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .expect("cancellation should fire once the post fails");
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn successful_posts_do_not_cancel_the_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink { calls: calls.clone() });
        let cancel = CancellationToken::new();

        let mut writer = UploadPump::spawn(sink, fast_config(), cancel.clone());
        writer.write_all(b"hello").await.unwrap();
        writer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!cancel.is_cancelled());
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
