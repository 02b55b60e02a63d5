//! Ordered request pipeline.
//!
//! ```text
//! request ─▶ StaticAssets ─▶ Logging ─▶ Compression ─▶ SecurityHeaders
//!         ─▶ IndexingControl ─▶ Session ─▶ Document
//! ```
//!
//! `StaticAssets` answers hits itself; `Document` always answers. Every other
//! stage passes the request on and decorates the response on the way back.

use axum::{middleware::from_fn_with_state, Router};
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::access_log::access_log;
use crate::http::document::render_document;
use crate::http::request::MakeRequestUuidV4;
use crate::http::server::AppState;
use crate::http::static_files::serve_static;
use crate::security::headers::{indexing_control, security_headers};
use crate::session::attach_session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    StaticAssets,
    Logging,
    Compression,
    SecurityHeaders,
    IndexingControl,
    Session,
    Document,
}

/// Stages in the order a request traverses them.
pub const STAGES: [Stage; 7] = [
    Stage::StaticAssets,
    Stage::Logging,
    Stage::Compression,
    Stage::SecurityHeaders,
    Stage::IndexingControl,
    Stage::Session,
    Stage::Document,
];

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::StaticAssets => "static-assets",
            Stage::Logging => "logging",
            Stage::Compression => "compression",
            Stage::SecurityHeaders => "security-headers",
            Stage::IndexingControl => "indexing-control",
            Stage::Session => "session",
            Stage::Document => "document",
        }
    }

    /// Whether the stage may answer without consulting later stages.
    pub fn short_circuits(&self) -> bool {
        matches!(self, Stage::StaticAssets | Stage::Document)
    }

    /// Wrap `router` in this stage. Layers added later run earlier.
    fn attach(&self, router: Router, state: &AppState) -> Router {
        match self {
            Stage::StaticAssets => router.layer(from_fn_with_state(state.clone(), serve_static)),
            Stage::Logging => router
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(from_fn_with_state(state.clone(), access_log))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4)),
            Stage::Compression => router.layer(CompressionLayer::new()),
            Stage::SecurityHeaders => {
                router.layer(from_fn_with_state(state.clone(), security_headers))
            }
            Stage::IndexingControl => {
                router.layer(from_fn_with_state(state.clone(), indexing_control))
            }
            Stage::Session => router.layer(from_fn_with_state(state.clone(), attach_session)),
            // The document handler is the router's fallback.
            Stage::Document => router,
        }
    }
}

/// Build the full pipeline around the document handler.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .fallback(render_document)
        .with_state(state.clone());

    STAGES
        .iter()
        .rev()
        .fold(router, |router, stage| stage.attach(router, &state))
}
