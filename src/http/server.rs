//! HTTP server setup.
//!
//! # Responsibilities
//! - Hold the shared application state
//! - Build the request pipeline around the document renderer
//! - Serve until shutdown, then drain within the grace period

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};

use crate::config::RuntimeConfig;
use crate::http::document::ABORT_DELAY;
use crate::http::pipeline::build_router;
use crate::http::static_files::StaticFiles;
use crate::i18n::LocaleResolver;
use crate::lifecycle::InFlight;
use crate::observability::{ErrorMonitor, TracingMonitor};
use crate::render::{DocumentRenderer, ShellRenderer};
use crate::security::{FormProtection, PolicySet};
use crate::session::CookieSessionStore;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared by every pipeline stage.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RuntimeConfig>,
    /// Built once at startup; only the nonce varies per request.
    pub policies: Arc<PolicySet>,
    pub sessions: CookieSessionStore,
    pub forms: FormProtection,
    pub locales: LocaleResolver,
    pub static_files: StaticFiles,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub monitor: Arc<dyn ErrorMonitor>,
    pub in_flight: InFlight,
    pub render_deadline: Duration,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        renderer: Arc<dyn DocumentRenderer>,
        monitor: Arc<dyn ErrorMonitor>,
    ) -> Self {
        let secure = config.secure_cookies();
        Self {
            policies: Arc::new(config.csp_policies()),
            sessions: CookieSessionStore::new(&config.session_secret, secure),
            forms: FormProtection::from_config(&config),
            locales: LocaleResolver::new(&config.locales),
            static_files: StaticFiles::from_config(&config),
            config: Arc::new(config),
            renderer,
            monitor,
            in_flight: InFlight::new(),
            render_deadline: ABORT_DELAY,
        }
    }

    pub fn with_render_deadline(mut self, deadline: Duration) -> Self {
        self.render_deadline = deadline;
        self
    }
}

/// HTTP server for the document pipeline.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// Server with the built-in shell renderer and the tracing monitor.
    pub fn with_defaults(config: RuntimeConfig) -> Self {
        let renderer = Arc::new(ShellRenderer::new(
            config.server_manifest_path(),
            config.mode,
        ));
        let monitor = Arc::new(TracingMonitor::new(config.sentry_dsn.as_ref()));
        Self::new(AppState::new(config, renderer, monitor))
    }

    /// Run the server until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let grace = self.state.config.shutdown_grace;
        let in_flight = self.state.in_flight.clone();

        tracing::info!(
            address = %addr,
            mode = %self.state.config.mode,
            "Server started on http://localhost:{}",
            addr.port()
        );

        let draining = Arc::new(Notify::new());
        let notify = draining.clone();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Stopped accepting connections, draining");
                notify.notify_one();
            })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            _ = draining.notified() => {
                match tokio::time::timeout(grace, &mut serve).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!(
                        in_flight = in_flight.active_count(),
                        grace_secs = grace.as_secs(),
                        "Grace period elapsed, abandoning in-flight requests"
                    ),
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
