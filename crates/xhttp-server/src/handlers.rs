use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use futures::{Stream, TryStreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use xhttp_core::{Packet, SessionId, TunnelError};
use xhttp_queue::QueueError;

use crate::conn::Connection;
use crate::response::{status_response, tunnel_error_response};
use crate::router::AppState;

/// A download-adoption stream that removes its session from the table the
/// moment the client stops reading, mirroring the teacher's SSE
/// `CleanupStream` pattern: cleanup runs on `Drop`, spawned since `Drop`
/// cannot itself `.await`.
struct CleanupOnDrop<S> {
    inner: Pin<Box<S>>,
    sessions: xhttp_session::SessionTable,
    session_id: SessionId,
    cancel: CancellationToken,
}

impl<S: Stream> Stream for CleanupOnDrop<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.as_mut().poll_next(cx)
    }
}

impl<S> Drop for CleanupOnDrop<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
        let sessions = self.sessions.clone();
        let session_id = self.session_id.clone();
        tokio::spawn(async move { sessions.remove(&session_id) });
    }
}

/// GET with a non-empty session id: hand the proxy core a `Connection`
/// whose reader drains the session's upload queue and whose writer is a
/// sink for the GET response body (spec §4.3 stream-down row, §2 "the
/// resulting Connection is handed to `add_conn`"), mirroring `stream_one`'s
/// adoption shape.
pub async fn stream_down(state: AppState, session_id: SessionId) -> Response {
    let Some(sink) = state.conn_sink.clone() else {
        return status_response(StatusCode::SERVICE_UNAVAILABLE);
    };

    let session = state.sessions.upsert(session_id.clone());
    state.sessions.mark_fully_connected(&session_id);

    let queue = session.upload_queue.clone();
    let log_id = session_id.clone();
    let upload_stream = async_stream::stream! {
        let mut buf = vec![0u8; 8192];
        loop {
            match queue.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok::<_, std::io::Error>(Bytes::copy_from_slice(&buf[..n])),
                Err(err) => {
                    warn!(session_id = %log_id, error = %err, "upload stream aborted by queue fault");
                    break;
                }
            }
        }
    };
    let reader: Pin<Box<dyn AsyncRead + Send>> = Box::pin(StreamReader::new(upload_stream));

    let (write_half, read_half) = tokio::io::duplex(8192);
    let writer: Pin<Box<dyn AsyncWrite + Send>> = Box::pin(write_half);
    let cancel = CancellationToken::new();

    let conn = Connection {
        reader,
        writer,
        cancel: cancel.clone(),
    };
    tokio::spawn(async move { sink.add_conn(conn).await });

    let stream = CleanupOnDrop {
        inner: Box::pin(ReaderStream::new(read_half)),
        sessions: state.sessions.clone(),
        session_id,
        cancel,
    };

    let mut response = Response::new(Body::from_stream(stream));
    apply_download_headers(&mut response, &state);
    response
}

/// POST with an empty `seq` segment: adopt the request body as an
/// indefinite upload stream; when a `Referer` is present and a keepalive
/// interval is configured, the response body carries periodic `'X'`
/// padding keepalives until the upload closes (spec §4.3 stream-up row,
/// §6 wire protocol).
pub async fn stream_up(state: AppState, session_id: SessionId, has_referer: bool, body: Body) -> Response {
    if !state.stream_up_guard.insert(session_id.clone()) {
        return tunnel_error_response(&TunnelError::Session(xhttp_core::SessionFault::DuplicateStreamUp));
    }

    let session = state.sessions.upsert(session_id.clone());
    let reader = StreamReader::new(
        body.into_data_stream()
            .map_err(|e| std::io::Error::other(e.to_string())),
    );
    if let Err(err) = session.upload_queue.push(Packet::Stream {
        seq: 0,
        reader: Box::new(reader),
    }) {
        state.stream_up_guard.remove(&session_id);
        return tunnel_error_response(&TunnelError::from(err));
    }

    let config = state.config.clone();
    let queue = session.upload_queue.clone();
    let guard = state.stream_up_guard.clone();
    let guard_id = session_id.clone();
    let keepalive_secs = has_referer.then(|| config.stream_up_server_secs).flatten().filter(|r| r.to > 0);
    let keepalive = async_stream::stream! {
        let Some(secs_range) = keepalive_secs else {
            guard.remove(&guard_id);
            return;
        };
        loop {
            tokio::time::sleep(Duration::from_secs(secs_range.roll().max(1))).await;
            if queue.is_closed() {
                break;
            }
            let chunk = xhttp_core::padding::generate_keepalive(config.padding);
            yield Ok::<_, std::io::Error>(Bytes::from(chunk));
        }
        guard.remove(&guard_id);
    };

    Response::new(Body::from_stream(keepalive))
}

/// POST with a numeric `seq` segment: read a bounded body, push it as a
/// single packet (spec §4.3 packet-up row).
pub async fn packet_up(state: AppState, session_id: SessionId, seq: &str, body: Body) -> Response {
    let Ok(seq) = seq.parse::<u64>() else {
        return tunnel_error_response(&TunnelError::from(QueueError::MalformedSeq));
    };

    let limit = state.config.max_each_post_bytes + 1;
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(_) => return status_response(StatusCode::PAYLOAD_TOO_LARGE),
    };
    if bytes.len() > state.config.max_each_post_bytes {
        return status_response(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let session = state.sessions.upsert(session_id.clone());
    match session.upload_queue.push(Packet::Bounded { seq, payload: bytes }) {
        Ok(_) => status_response(StatusCode::OK),
        Err(err) => tunnel_error_response(&TunnelError::from(err)),
    }
}

/// Any method with an empty session-id segment: duplex the request body and
/// response body directly, handed to the configured `ConnSink` without
/// going through a session at all (spec §4.3 stream-one row).
pub async fn stream_one(state: AppState, body: Body) -> Response {
    let Some(sink) = state.conn_sink.clone() else {
        return status_response(StatusCode::SERVICE_UNAVAILABLE);
    };

    let reader: Pin<Box<dyn AsyncRead + Send>> = Box::pin(StreamReader::new(
        body.into_data_stream()
            .map_err(|e| std::io::Error::other(e.to_string())),
    ));

    let (write_half, read_half) = tokio::io::duplex(8192);
    let writer: Pin<Box<dyn AsyncWrite + Send>> = Box::pin(write_half);
    let cancel = CancellationToken::new();

    let conn = Connection {
        reader,
        writer,
        cancel: cancel.clone(),
    };
    tokio::spawn(async move { sink.add_conn(conn).await });

    let stream = CancelOnDrop {
        inner: ReaderStream::new(read_half),
        cancel,
    };
    let mut response = Response::new(Body::from_stream(stream));
    apply_download_headers(&mut response, &state);
    response
}

struct CancelOnDrop<S> {
    inner: S,
    cancel: CancellationToken,
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl<S> Drop for CancelOnDrop<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn apply_download_headers(response: &mut Response, state: &AppState) {
    let headers = response.headers_mut();
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if !state.config.no_sse_header {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    }
    debug!("download headers applied");
}
