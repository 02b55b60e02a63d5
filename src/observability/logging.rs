//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the default filter

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Mode;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "document_server=info,tower_http=info";

/// Install the global subscriber.
///
/// `mode` is `None` when configuration failed to load; output then falls
/// back to the human-readable format so the field errors stay legible.
pub fn init(mode: Option<Mode>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = if mode.is_some_and(|m| m.is_production()) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        // Already installed (tests, embedding applications).
        tracing::debug!(error = %e, "Tracing subscriber not installed");
    }
}
