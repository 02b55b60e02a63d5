//! Document server library.
//!
//! Serves a server-rendered web application through an ordered pipeline:
//! static files, request logging, compression, security headers, indexing
//! control, cookie sessions and a streaming document renderer with an
//! abort deadline.

pub mod config;
pub mod http;
pub mod i18n;
pub mod lifecycle;
pub mod observability;
pub mod render;
pub mod security;
pub mod session;

pub use config::{load_config, RuntimeConfig};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
