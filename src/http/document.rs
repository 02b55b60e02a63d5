//! Document stage: form protection, render request assembly and streaming
//! under the abort deadline.
//!
//! # Design Decisions
//! - The deadline covers the whole render, including the body stream
//! - Failures before the first chunk become a generic `500`
//! - Failures after the first chunk terminate the body; the status is
//!   already on the wire
//! - A dropped body (client gone) is logged at debug level and never
//!   reported
//! - Crawlers get the whole document buffered under the same deadline, so
//!   a failure anywhere in the render is still a `500`
//! - `HEAD` stops after the first chunk; nothing past the head is sent

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, request::Parts, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::stream::{self, Stream, StreamExt};
use tokio::time::{sleep_until, timeout_at, Instant, Sleep};

use crate::http::request::X_REQUEST_ID;
use crate::http::server::AppState;
use crate::http::user_agent::is_bot_request;
use crate::observability::metrics;
use crate::observability::{ErrorEvent, ErrorMonitor};
use crate::render::{
    DocumentRenderer, FormContext, RenderError, RenderRequest, RenderStream, RenderedDocument,
    RequestSecurityContext,
};
use crate::security::{CspNonce, FormData};
use crate::session::{Session, SessionRecord};

/// Default abort deadline for a render.
pub const ABORT_DELAY: Duration = Duration::from_secs(5);

pub const FORM_REJECTED: &str = "Form not submitted properly";

const MAX_FORM_BYTES: usize = 64 * 1024;

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

fn is_form_submission(parts: &Parts) -> bool {
    if matches!(parts.method, Method::GET | Method::HEAD) {
        return false;
    }
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(FORM_MEDIA_TYPE))
}

/// Read and verify a submitted form. `Err` is the response to send.
async fn read_form(state: &AppState, parts: &Parts, body: Body) -> Result<FormData, Response> {
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "Form body could not be read");
            (StatusCode::PAYLOAD_TOO_LARGE, FORM_REJECTED).into_response()
        })?;

    let verified =
        FormData::parse(&bytes).and_then(|form| state.forms.verify(&parts.headers, &form).map(|_| form));

    verified.map_err(|reason| {
        tracing::debug!(reason = %reason, "Form submission rejected");
        (StatusCode::BAD_REQUEST, FORM_REJECTED).into_response()
    })
}

/// Fallback handler: the innermost pipeline stage.
pub async fn render_document(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let nonce = parts
        .extensions
        .get::<CspNonce>()
        .cloned()
        .unwrap_or_else(CspNonce::generate);
    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .unwrap_or_else(|| Session::new(SessionRecord::default()));

    let form = if is_form_submission(&parts) {
        match read_form(&state, &parts, body).await {
            Ok(form) => Some(form),
            Err(response) => return response,
        }
    } else {
        None
    };

    let locale = state.locales.resolve(&parts.uri, &parts.headers);
    let (csrf_token, csrf_cookie) = state.forms.csrf.commit_token(&parts.headers);

    let report = FailureReport {
        monitor: state.monitor.clone(),
        method: parts.method.to_string(),
        path: parts.uri.path().to_owned(),
        request_id: parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };

    let render_request = RenderRequest {
        all_ready: is_bot_request(&parts.headers),
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        context: RequestSecurityContext {
            nonce: nonce.as_str().to_owned(),
            locale,
        },
        env: state.config.public_env(),
        session,
        form,
        forms: FormContext {
            csrf_token,
            honeypot: state.forms.honeypot_props(),
        },
    };

    let mut response = render_with_deadline(
        state.renderer.clone(),
        render_request,
        state.render_deadline,
        report,
    )
    .await;

    if let Some(cookie) = csrf_cookie {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// Reports render failures of a single request.
#[derive(Clone)]
pub struct FailureReport {
    pub monitor: Arc<dyn ErrorMonitor>,
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

impl FailureReport {
    fn report(&self, error: &RenderError, streaming: bool) {
        tracing::warn!(
            kind = error.kind(),
            streaming,
            error = %error,
            "Document render failed"
        );
        metrics::record_render_failure(error.kind());
        self.monitor.capture(&ErrorEvent {
            kind: error.kind(),
            message: error.to_string(),
            method: self.method.clone(),
            path: self.path.clone(),
            request_id: self.request_id.clone(),
        });
    }

    fn fail(self, error: RenderError) -> Response {
        self.report(&error, false);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// Run a render, holding it to `deadline` from start to last chunk.
pub async fn render_with_deadline(
    renderer: Arc<dyn DocumentRenderer>,
    request: RenderRequest,
    deadline: Duration,
    report: FailureReport,
) -> Response {
    let deadline = Instant::now() + deadline;
    let all_ready = request.all_ready;
    let head = request.method == Method::HEAD;

    let document = match timeout_at(deadline, renderer.render(request)).await {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => return report.fail(e),
        Err(_) => return report.fail(RenderError::Timeout),
    };
    let RenderedDocument {
        status,
        headers,
        mut body,
    } = document;

    // Hold the status until the renderer proves it can produce output.
    let first = match timeout_at(deadline, body.next()).await {
        Ok(Some(Ok(chunk))) => Some(chunk),
        Ok(None) => None,
        Ok(Some(Err(e))) => return report.fail(e),
        Err(_) => return report.fail(RenderError::Timeout),
    };

    if all_ready && !head {
        return match buffer_all(first, body, deadline).await {
            Ok(html) => respond(status, headers, Body::from(html)),
            Err(e) => report.fail(e),
        };
    }

    let tail = Tail {
        first,
        body,
        deadline: Box::pin(sleep_until(deadline)),
        report,
        finished: head,
    };
    respond(status, headers, Body::from_stream(tail_stream(tail)))
}

fn respond(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Drain the rest of the render before anything is sent.
async fn buffer_all(
    first: Option<Bytes>,
    mut body: RenderStream,
    deadline: Instant,
) -> Result<Vec<u8>, RenderError> {
    let mut html = first.map(|chunk| chunk.to_vec()).unwrap_or_default();
    loop {
        match timeout_at(deadline, body.next()).await {
            Ok(Some(Ok(chunk))) => html.extend_from_slice(&chunk),
            Ok(Some(Err(e))) => return Err(e),
            Ok(None) => return Ok(html),
            Err(_) => return Err(RenderError::Timeout),
        }
    }
}

/// Remainder of a streaming document.
struct Tail {
    first: Option<Bytes>,
    body: RenderStream,
    deadline: Pin<Box<Sleep>>,
    report: FailureReport,
    finished: bool,
}

impl Tail {
    fn abort(mut self, error: RenderError) -> Option<(Result<Bytes, RenderError>, Tail)> {
        self.report.report(&error, true);
        self.finished = true;
        Some((Err(error), self))
    }
}

impl Drop for Tail {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(path = %self.report.path, "Client disconnected before the document finished");
        }
    }
}

fn tail_stream(tail: Tail) -> impl Stream<Item = Result<Bytes, RenderError>> + Send {
    stream::unfold(tail, |mut tail| async move {
        if tail.finished {
            return None;
        }
        if let Some(chunk) = tail.first.take() {
            return Some((Ok(chunk), tail));
        }

        tokio::select! {
            next = tail.body.next() => match next {
                Some(Ok(chunk)) => Some((Ok(chunk), tail)),
                Some(Err(e)) => tail.abort(e),
                None => {
                    tail.finished = true;
                    None
                }
            },
            _ = &mut tail.deadline => tail.abort(RenderError::Timeout),
        }
    })
}
