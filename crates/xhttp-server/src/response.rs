use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use xhttp_core::TunnelError;

/// Maps a [`TunnelError`] to the status the wire protocol promises (spec
/// §4.3 routing table / §7).
#[must_use]
pub fn tunnel_error_response(err: &TunnelError) -> Response {
    status_response(
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    )
}

#[must_use]
pub fn status_response(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .expect("static response is well-formed")
}
