use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use dashmap::DashSet;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use xhttp_core::SessionId;

use crate::config::XhttpServerConfig;
use crate::conn::ConnSink;
use crate::handlers::{packet_up, stream_down, stream_one, stream_up};
use crate::response::status_response;
use crate::validate::{RouteMatch, match_host, match_path, split_suffix, validate_padding};
use xhttp_session::SessionTable;

/// Shared state for the single XHTTP handler (spec §4.3: "a single HTTP
/// handler mountable on an H1+H2(c)+H3 listener").
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<XhttpServerConfig>,
    pub sessions: SessionTable,
    pub stream_up_guard: Arc<DashSet<SessionId>>,
    pub conn_sink: Option<Arc<dyn ConnSink>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: XhttpServerConfig, sessions: SessionTable, conn_sink: Option<Arc<dyn ConnSink>>) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            stream_up_guard: Arc::new(DashSet::new()),
            conn_sink,
        }
    }
}

/// Builds the router: one fallback handler covers every path, since the
/// mount prefix and session-id/seq segments are determined by config, not a
/// fixed axum route table.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn handle_request(State(state): State<AppState>, req: Request) -> Response {
    let headers = req.headers();
    let host_header = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok());
    if match_host(&state.config, host_header) == RouteMatch::NotFound {
        return status_response(axum::http::StatusCode::NOT_FOUND);
    }

    let path = req.uri().path().to_string();
    if match_path(&state.config, &path) == RouteMatch::NotFound {
        return status_response(axum::http::StatusCode::NOT_FOUND);
    }

    let padding = extract_padding(&req);
    if !validate_padding(&state.config, padding.as_deref()) {
        return status_response(axum::http::StatusCode::BAD_REQUEST);
    }

    let has_referer = headers.contains_key(axum::http::header::REFERER);
    let (session_id, seq) = split_suffix(&state.config, &path);
    let method = req.method().clone();

    if session_id.is_empty() {
        if state.config.mode == crate::config::XhttpMode::PacketUp {
            return status_response(axum::http::StatusCode::NOT_FOUND);
        }
        return stream_one(state, req.into_body()).await;
    }

    let Ok(session_id) = session_id.parse::<SessionId>() else {
        return status_response(axum::http::StatusCode::BAD_REQUEST);
    };

    match (method.as_str(), seq) {
        ("POST", Some(seq)) => packet_up(state, session_id, &seq, req.into_body()).await,
        ("POST", None) => stream_up(state, session_id, has_referer, req.into_body()).await,
        (_, _) => stream_down(state, session_id).await,
    }
}

/// `x_padding` from the query string, falling back to the same param inside
/// `Referer`'s query for the browser-dialer path (spec §4.3 step 3).
fn extract_padding(req: &Request) -> Option<String> {
    let from_query = req.uri().query().and_then(|q| find_param(q, "x_padding"));
    if from_query.is_some() {
        return from_query;
    }
    req.headers()
        .get(axum::http::header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|referer| referer.split_once('?'))
        .and_then(|(_, query)| find_param(query, "x_padding"))
}

fn find_param(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_x_padding_from_query() {
        let req = Request::builder()
            .uri("/tunnel/abc?x_padding=0000")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_padding(&req).as_deref(), Some("0000"));
    }

    #[test]
    fn falls_back_to_referer_query() {
        let req = Request::builder()
            .uri("/tunnel/abc")
            .header(axum::http::header::REFERER, "https://x.test/?x_padding=00")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_padding(&req).as_deref(), Some("00"));
    }

    #[tokio::test]
    async fn packet_up_mode_rejects_stream_one_shape() {
        use tower::ServiceExt;

        let config = XhttpServerConfig {
            mode: crate::config::XhttpMode::PacketUp,
            ..Default::default()
        };
        let state = AppState::new(config, SessionTable::new(Default::default()), None);
        let app = router(state);

        let req = Request::builder()
            .uri("/")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
