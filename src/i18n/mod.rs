//! Locale negotiation.
//!
//! # Design Decisions
//! - Signals in priority order: `?lng=` query, `lng` cookie, `Accept-Language`
//! - Only configured locales are ever returned; the first one is the fallback
//! - Region tags fall back to their language (`es-MX` → `es`)

pub mod locale;

pub use locale::{parse_accept_language, LocaleResolver, LOCALE_COOKIE};
