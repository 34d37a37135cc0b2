//! Dispatches one request over a pooled [`Carrier`](xhttp_race::Carrier),
//! either H2 or H3. XHTTP's own client needs this directly (unlike the
//! server side, which only speaks plain HTTP via `axum`) because
//! `xhttp-race` hands back a raw `SendRequest` handle rather than a
//! higher-level HTTP client (spec.md §4.6 supplement: reusing a cached H2
//! handle across requests is exactly what `reqwest` does not expose).

use std::future::poll_fn;
use std::pin::Pin;

use bytes::{Buf, Bytes};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use xhttp_core::TunnelError;
use xhttp_race::{Carrier, H2SendRequest, H3SendRequest};

use crate::pool::PooledCarrier;

/// Status plus a lazy response body.
pub struct CarrierResponse {
    pub status: u16,
    pub body: Pin<Box<dyn AsyncRead + Send>>,
}

/// Sends `request` over `pooled`, marking it closed on any transport
/// failure so `MuxManager` retires the entry instead of handing it out
/// again (mirrors the teacher's pattern of a health flag checked lazily at
/// the next pool lookup rather than proactively evicted).
///
/// # Errors
///
/// Returns [`TunnelError::Network`] if the handshake-level send fails.
pub async fn send(pooled: &PooledCarrier, request: http::Request<Bytes>) -> Result<CarrierResponse, TunnelError> {
    let result = match &pooled.carrier {
        Carrier::H2(send_request) => send_h2(send_request, request).await,
        Carrier::H3(send_request) => send_h3(send_request, request).await,
    };
    if result.is_err() {
        pooled.mark_closed();
    }
    result
}

async fn send_h2(send_request: &H2SendRequest, request: http::Request<Bytes>) -> Result<CarrierResponse, TunnelError> {
    let mut send_request = send_request.clone();
    poll_fn(|cx| send_request.poll_ready(cx)).await.map_err(h2_err)?;

    let (parts, body) = request.into_parts();
    let head = http::Request::from_parts(parts, ());
    let (response_fut, mut send_stream) = send_request.send_request(head, false).map_err(h2_err)?;
    send_stream.send_data(body, true).map_err(h2_err)?;

    let response = response_fut.await.map_err(h2_err)?;
    let status = response.status().as_u16();
    let mut recv_stream = response.into_body();
    let stream = async_stream::stream! {
        loop {
            match recv_stream.data().await {
                Some(Ok(chunk)) => {
                    let _ = recv_stream.flow_control().release_capacity(chunk.len());
                    yield Ok::<_, std::io::Error>(chunk);
                }
                Some(Err(err)) => {
                    yield Err(std::io::Error::other(err.to_string()));
                    break;
                }
                None => break,
            }
        }
    };
    Ok(CarrierResponse {
        status,
        body: Box::pin(StreamReader::new(stream)),
    })
}

async fn send_h3(send_request: &H3SendRequest, request: http::Request<Bytes>) -> Result<CarrierResponse, TunnelError> {
    let mut send_request = send_request.clone();
    let (parts, body) = request.into_parts();
    let head = http::Request::from_parts(parts, ());

    let mut stream = send_request.send_request(head).await.map_err(h3_err)?;
    stream.send_data(body).await.map_err(h3_err)?;
    stream.finish().await.map_err(h3_err)?;

    let response = stream.recv_response().await.map_err(h3_err)?;
    let status = response.status().as_u16();
    let body_stream = async_stream::stream! {
        loop {
            match stream.recv_data().await {
                Ok(Some(mut chunk)) => {
                    let bytes = chunk.copy_to_bytes(chunk.remaining());
                    yield Ok::<_, std::io::Error>(bytes);
                }
                Ok(None) => break,
                Err(err) => {
                    yield Err(std::io::Error::other(err.to_string()));
                    break;
                }
            }
        }
    };
    Ok(CarrierResponse {
        status,
        body: Box::pin(StreamReader::new(body_stream)),
    })
}

fn h2_err(err: h2::Error) -> TunnelError {
    TunnelError::Network(err.to_string())
}

fn h3_err(err: h3::Error) -> TunnelError {
    TunnelError::Network(err.to_string())
}
