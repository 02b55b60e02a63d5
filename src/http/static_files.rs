//! Static file stage.
//!
//! # Responsibilities
//! - Serve fingerprinted build assets under `/assets/` with a one year,
//!   immutable cache policy
//! - Serve public files with a one hour cache policy
//! - Fall through to the rest of the pipeline on a miss

use std::path::Path;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::RuntimeConfig;
use crate::http::server::AppState;

pub const ASSETS_PREFIX: &str = "/assets/";
pub const ASSETS_CACHE: &str = "public, max-age=31536000, immutable";
pub const PUBLIC_CACHE: &str = "public, max-age=3600";

/// File roots of the static stage.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    /// Rooted at the client build so `/assets/x.js` maps to `client/assets/x.js`.
    assets: ServeDir,
    public: ServeDir,
}

impl StaticFiles {
    pub fn new(client_dir: impl AsRef<Path>, public_root: impl AsRef<Path>) -> Self {
        Self {
            assets: ServeDir::new(client_dir).append_index_html_on_directories(false),
            public: ServeDir::new(public_root).append_index_html_on_directories(false),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.client_dir(), config.public_root())
    }

    /// Response for a static hit, `None` when the request should fall through.
    ///
    /// Takes the request head only; the body is never needed here.
    pub async fn lookup(&self, request: &Request<()>) -> Option<Response> {
        if !matches!(*request.method(), Method::GET | Method::HEAD) {
            return None;
        }
        let path = request.uri().path();
        if path.ends_with('/') {
            return None;
        }

        if path.starts_with(ASSETS_PREFIX) {
            if let Some(response) = serve_from(&self.assets, request, ASSETS_CACHE).await {
                return Some(response);
            }
        }
        serve_from(&self.public, request, PUBLIC_CACHE).await
    }
}

async fn serve_from(dir: &ServeDir, request: &Request<()>, cache: &'static str) -> Option<Response> {
    let mut forwarded = Request::new(Body::empty());
    *forwarded.method_mut() = request.method().clone();
    *forwarded.uri_mut() = request.uri().clone();
    *forwarded.headers_mut() = request.headers().clone();

    let response = match dir.clone().oneshot(forwarded).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return None;
    }

    let mut response = response.map(Body::new);
    if !response.status().is_client_error() && !response.status().is_server_error() {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache));
    }
    Some(response)
}

/// Static assets stage.
pub async fn serve_static(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let head = Request::from_parts(parts, ());
    if let Some(response) = state.static_files.lookup(&head).await {
        tracing::trace!(path = %head.uri().path(), status = response.status().as_u16(), "Static hit");
        return response;
    }
    let (parts, ()) = head.into_parts();
    next.run(Request::from_parts(parts, body)).await
}
