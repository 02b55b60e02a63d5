//! Error monitoring.
//!
//! The pipeline reports render and build failures through [`ErrorMonitor`].
//! Requests the client abandoned are filtered out before reporting, so
//! implementations only ever see failures a user actually experienced.

use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

/// A failure worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// `build`, `render` or `timeout`.
    pub kind: &'static str,
    pub message: String,
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

/// Sink for unexpected server errors.
pub trait ErrorMonitor: Send + Sync {
    fn capture(&self, event: &ErrorEvent);
}

/// Default monitor: logs every event at error level.
#[derive(Debug, Default)]
pub struct TracingMonitor {
    dsn_host: Option<String>,
    captured: AtomicU64,
}

impl TracingMonitor {
    pub fn new(dsn: Option<&Url>) -> Self {
        Self {
            dsn_host: dsn.and_then(|d| d.host_str()).map(str::to_owned),
            captured: AtomicU64::new(0),
        }
    }

    /// Events captured since startup.
    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }
}

impl ErrorMonitor for TracingMonitor {
    fn capture(&self, event: &ErrorEvent) {
        let count = self.captured.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(
            kind = event.kind,
            method = %event.method,
            path = %event.path,
            request_id = event.request_id.as_deref().unwrap_or("-"),
            monitoring = self.dsn_host.as_deref().unwrap_or("disabled"),
            captured = count,
            error = %event.message,
            "Unhandled server error"
        );
    }
}
