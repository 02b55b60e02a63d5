//! Document rendering.
//!
//! # Data Flow
//! ```text
//! document stage
//!     → RenderRequest (method, URI, nonce + locale, public env, session, form, bot flag)
//!     → DocumentRenderer::render
//!     → RenderedDocument (status, headers, lazy byte stream)
//!     → document stage streams it under the abort deadline
//! ```
//!
//! # Design Decisions
//! - Renderers are opaque: the pipeline only sees a status, headers and a stream
//! - The body is produced lazily so cancellation drops all render state
//! - `ShellRenderer` loads the build manifest per request; a missing build
//!   fails that request only

pub mod build;
pub mod routes;
pub mod shell;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::config::PublicEnv;
use crate::security::honeypot::HoneypotInputProps;
use crate::security::FormData;
use crate::session::Session;

pub use build::{BuildError, ServerBuild};
pub use shell::ShellRenderer;

/// Lazy document body.
pub type RenderStream = BoxStream<'static, Result<Bytes, RenderError>>;

/// Per-request values scoping inline code and language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSecurityContext {
    pub nonce: String,
    pub locale: String,
}

/// Values a rendered form must carry.
#[derive(Debug, Clone)]
pub struct FormContext {
    pub csrf_token: String,
    pub honeypot: HoneypotInputProps,
}

/// One render invocation.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Automated client: the document is sent only once fully rendered.
    pub all_ready: bool,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub context: RequestSecurityContext,
    pub env: PublicEnv,
    pub session: Session,
    /// Verified form submission, if any.
    pub form: Option<FormData>,
    pub forms: FormContext,
}

/// Output of a renderer.
pub struct RenderedDocument {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: RenderStream,
}

impl std::fmt::Debug for RenderedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedDocument")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load server build: {0}")]
    Build(#[from] BuildError),

    #[error("render failed: {0}")]
    Render(String),

    #[error("render did not complete within the abort deadline")]
    Timeout,
}

impl RenderError {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Build(_) => "build",
            RenderError::Render(_) => "render",
            RenderError::Timeout => "timeout",
        }
    }
}

/// Produces the HTML document for a request.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderedDocument, RenderError>;
}
