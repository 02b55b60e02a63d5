//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → pipeline.rs (ordered stages)
//!         → static_files.rs (assets and public files)
//!         → request.rs + access_log.rs (request ID, logging, metrics)
//!         → compression, security headers, session
//!         → document.rs (form checks, render under the abort deadline;
//!           user_agent.rs picks streamed or buffered delivery)
//!     → Send to client
//! ```

pub mod access_log;
pub mod document;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod static_files;
pub mod user_agent;

pub use pipeline::{build_router, Stage, STAGES};
pub use request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
pub use static_files::StaticFiles;
