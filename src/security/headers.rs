//! Security and indexing response headers.
//!
//! # Responsibilities
//! - Generate the per-request CSP nonce and expose it to inner stages
//! - Attach CSP (enforced, report-only, or both), HSTS, Referrer-Policy, nosniff
//! - Attach `X-Robots-Tag` when indexing is disallowed

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::RuntimeConfig;
use crate::http::server::AppState;
use crate::security::csp::PolicySet;
use crate::security::nonce::CspNonce;

pub const HSTS: &str = "max-age=15552000; includeSubDomains";
pub const REFERRER_POLICY: &str = "same-origin";
pub const NOINDEX: &str = "noindex, nofollow";

const DOCUMENT_POLICY: &str = "document-policy";
pub const X_ROBOTS_TAG: &str = "x-robots-tag";

/// Write the security headers for one response.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    policies: &PolicySet,
    nonce: &CspNonce,
    config: &RuntimeConfig,
) {
    for policy in policies.iter() {
        match HeaderValue::from_str(&policy.header_value(nonce.as_str())) {
            Ok(value) => {
                headers.insert(policy.header_name(), value);
            }
            Err(e) => {
                tracing::error!(error = %e, "Content-Security-Policy is not a valid header value")
            }
        }
    }
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static(REFERRER_POLICY),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    if config.mode.is_production() && config.sentry_dsn.is_some() {
        headers.append(
            HeaderName::from_static(DOCUMENT_POLICY),
            HeaderValue::from_static("js-profiling"),
        );
    }
}

/// Security-header stage.
pub async fn security_headers(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let nonce = CspNonce::generate();
    request.extensions_mut().insert(nonce.clone());

    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), &state.policies, &nonce, &state.config);
    response
}

/// Indexing-control stage.
pub async fn indexing_control(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if !state.config.allow_indexing {
        response.headers_mut().insert(
            HeaderName::from_static(X_ROBOTS_TAG),
            HeaderValue::from_static(NOINDEX),
        );
    }
    response
}
