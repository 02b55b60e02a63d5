//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → headers.rs (nonce, CSP policies built by csp.rs, HSTS, referrer policy)
//!     → headers.rs (X-Robots-Tag when indexing is off)
//!
//! Form submissions (document stage):
//!     → honeypot.rs (spam check)
//!     → csrf.rs (signed cookie vs form field)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected form is a 400, never a system error
//! - Cookie values are signed with HMAC-SHA256 (signing.rs)

pub mod csp;
pub mod csrf;
pub mod form;
pub mod headers;
pub mod honeypot;
pub mod nonce;
pub mod signing;

pub use csp::{build_policy, CspMode, CspOptions, Directive, DirectiveSet, PolicySet, Source};
pub use form::{FormData, FormError, FormProtection};
pub use nonce::CspNonce;
