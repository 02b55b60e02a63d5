//! Logging stage: one span and one completion event per request.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Log method, path, status and time to response headers.
pub async fn access_log(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request.request_id().unwrap_or("-").to_owned();
    let guard = state.in_flight.track();

    let span = tracing::info_span!(
        "request",
        method = %method,
        path = %path,
        request_id = %request_id,
        seq = guard.seq()
    );

    let response = next.run(request).instrument(span.clone()).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), elapsed_ms, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), elapsed_ms, "Request completed");
        }
    });
    metrics::record_request(method.as_str(), status.as_u16(), start);
    drop(guard);

    response
}
