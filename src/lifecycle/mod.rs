//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Metrics exporter → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Configuration is validated before anything binds a port
//! - Shutdown has a deadline: requests still running after
//!   `SHUTDOWN_GRACE_SECS` are abandoned

pub mod inflight;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use inflight::{InFlight, InFlightGuard};
pub use shutdown::Shutdown;
pub use startup::{start, StartupError};
