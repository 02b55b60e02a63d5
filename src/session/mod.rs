//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request:
//!     → middleware.rs (load record from the signed cookie)
//!     → Session handle in request extensions
//!     → document renderer reads/mutates it
//! Response:
//!     → middleware.rs (re-sign and append Set-Cookie if changed)
//! ```

pub mod cookie;
pub mod middleware;
pub mod store;

pub use middleware::attach_session;
pub use store::{CookieSessionStore, Session, SessionRecord, SESSION_COOKIE, SESSION_MAX_AGE};
