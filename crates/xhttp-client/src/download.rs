//! Download adoption (spec §4.4 step 5): `GET baseURL`, transparently
//! stripping the optional two-byte `"ok"` legacy-compatibility prefix, and
//! cutting the stream short if the paired upload pump tears the session
//! down.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::sync::CancellationToken;
use xhttp_core::TunnelError;
use xhttp_race::{H2Dial, H3Dial};

use crate::config::XhttpClientConfig;
use crate::pool::CarrierPool;
use crate::request;
use crate::wire::build_request;

/// Opens the download body for `base_url`, guarded by `cancel` so a
/// mid-stream upload failure ends the read side too (spec.md §4.4
/// supplement's shared-cancellation requirement).
///
/// # Errors
///
/// Returns [`TunnelError::Network`] if the GET fails or the carrier
/// returns a non-2xx/3xx status.
pub async fn open_download<H3, H2>(
    pool: &CarrierPool<H3, H2>,
    authority: &str,
    base_url: &str,
    config: &XhttpClientConfig,
    cancel: CancellationToken,
) -> Result<Pin<Box<dyn AsyncRead + Send>>, TunnelError>
where
    H3: H3Dial + 'static,
    H2: H2Dial + 'static,
{
    let url = format!("{base_url}?x_padding={}", xhttp_core::padding::generate(config.padding));
    let http_request = build_request("GET", &url, Bytes::new(), config)?;

    let (handle, carrier) = pool.get(authority).await?;
    let result = request::send(&carrier, http_request).await;
    pool.release(handle);
    let response = result?;

    if response.status >= 400 {
        return Err(TunnelError::Network(format!("download GET failed with status {}", response.status)));
    }

    let peeled = peel_ok_prefix(response.body)
        .await
        .map_err(|e| TunnelError::Network(e.to_string()))?;
    Ok(Box::pin(CancelGuardedRead { inner: peeled, cancel }))
}

/// Strips a leading `b"ok"` prefix if present, replaying whatever was read
/// otherwise (spec §4.4 step 5).
async fn peel_ok_prefix(mut inner: Pin<Box<dyn AsyncRead + Send>>) -> std::io::Result<ChainReader> {
    let mut probe = [0u8; 2];
    let mut filled = 0usize;
    while filled < probe.len() {
        let n = inner.read(&mut probe[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let leftover = if filled == probe.len() && &probe == b"ok" {
        Vec::new()
    } else {
        probe[..filled].to_vec()
    };
    Ok(ChainReader {
        prefix: std::io::Cursor::new(leftover),
        inner,
    })
}

/// Replays a short byte prefix ahead of an inner reader.
struct ChainReader {
    prefix: std::io::Cursor<Vec<u8>>,
    inner: Pin<Box<dyn AsyncRead + Send>>,
}

impl AsyncRead for ChainReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let pos = this.prefix.position() as usize;
        let data = this.prefix.get_ref();
        if pos < data.len() {
            let remaining = &data[pos..];
            let n = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..n]);
            this.prefix.set_position((pos + n) as u64);
            return Poll::Ready(Ok(()));
        }
        this.inner.as_mut().poll_read(cx, buf)
    }
}

/// Ends the stream (as a clean EOF) once `cancel` fires, regardless of
/// what the inner reader still has buffered.
struct CancelGuardedRead {
    inner: ChainReader,
    cancel: CancellationToken,
}

impl AsyncRead for CancelGuardedRead {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let cancelled = this.cancel.cancelled();
        tokio::pin!(cancelled);
        if cancelled.poll(cx).is_ready() {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}
