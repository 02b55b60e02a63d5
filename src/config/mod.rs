//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (optional) + process environment
//!     → loader.rs (collect into a key/value map)
//!     → validation.rs (typed parsing, every field checked)
//!     → RuntimeConfig (validated, immutable)
//!     → shared via Arc to all stages
//!
//! Per render:
//!     RuntimeConfig::public_env()
//!     → PublicEnv (no secrets) embedded in the document
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no ambient global lookup
//! - Validation reports all offending fields, not just the first
//! - Secrets are wrapped so `Debug` output never prints them

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_env, ConfigError};
pub use schema::{
    AssetsConfig, CspConfig, ListenerConfig, LocaleConfig, Mode, PublicEnv, RuntimeConfig, Secret,
};
pub use validation::{validate_env, FieldError};
