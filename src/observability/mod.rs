//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages produce:
//!     → logging.rs (structured log events, JSON in production)
//!     → metrics.rs (request counters, latency histograms, render failures)
//!     → monitor.rs (render and build failures of connected clients)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Prometheus scrape endpoint when METRICS_ADDR is set
//! ```
//!
//! # Design Decisions
//! - The request ID is recorded on the request span and flows into every event
//! - Metric updates are cheap and always on; the exporter is optional
//! - Client disconnects and rejected forms never reach the monitor

pub mod logging;
pub mod metrics;
pub mod monitor;

pub use monitor::{ErrorEvent, ErrorMonitor, TracingMonitor};
