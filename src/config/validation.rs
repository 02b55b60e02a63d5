//! Environment validation.
//!
//! # Responsibilities
//! - Parse the raw key/value environment into a `RuntimeConfig`
//! - Apply defaults for optional fields
//! - Reject missing or malformed values
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: `&HashMap` → `Result<RuntimeConfig, Vec<FieldError>>`
//! - Empty optional values count as absent

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::config::schema::{
    AssetsConfig, CspConfig, ListenerConfig, LocaleConfig, Mode, RuntimeConfig, Secret,
};
use crate::security::csp::CspMode;

/// A single invalid environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collects parsed fields and every error encountered along the way.
struct EnvReader<'a> {
    vars: &'a HashMap<String, String>,
    errors: Vec<FieldError>,
}

impl<'a> EnvReader<'a> {
    fn new(vars: &'a HashMap<String, String>) -> Self {
        Self {
            vars,
            errors: Vec::new(),
        }
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required<T>(
        &mut self,
        key: &'static str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        match self.vars.get(key) {
            None => {
                self.fail(key, "is required".to_string());
                None
            }
            Some(value) if value.trim().is_empty() => {
                self.fail(key, "must not be empty".to_string());
                None
            }
            Some(value) => self.parse(key, value.trim(), parse),
        }
    }

    fn optional<T>(
        &mut self,
        key: &'static str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        let value = self.raw(key)?;
        self.parse(key, value, parse)
    }

    fn parse<T>(
        &mut self,
        key: &'static str,
        value: &str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        match parse(value) {
            Ok(v) => Some(v),
            Err(message) => {
                self.fail(key, message);
                None
            }
        }
    }

    fn fail(&mut self, field: &'static str, message: String) {
        self.errors.push(FieldError { field, message });
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected true or false (got {:?})", other)),
    }
}

fn parse_url(value: &str) -> Result<Url, String> {
    Url::parse(value).map_err(|e| format!("invalid URL: {}", e))
}

fn parse_secret(value: &str) -> Result<Secret, String> {
    Ok(Secret::new(value))
}

fn parse_locales(value: &str) -> Result<Vec<String>, String> {
    let locales: Vec<String> = value
        .split(',')
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    if locales.is_empty() {
        return Err("expected a comma separated list of locales".to_string());
    }
    if let Some(bad) = locales
        .iter()
        .find(|l| !l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
    {
        return Err(format!("invalid locale tag {:?}", bad));
    }
    Ok(locales)
}

/// Validate the raw environment.
pub fn validate_env(vars: &HashMap<String, String>) -> Result<RuntimeConfig, Vec<FieldError>> {
    let mut env = EnvReader::new(vars);

    let mode = env.required("APP_ENV", |v| v.parse::<Mode>());
    let session_secret = env.required("SESSION_SECRET", parse_secret);
    let csrf_secret = env.optional("CSRF_SECRET", parse_secret);
    let honeypot_secret = env.optional("HONEYPOT_SECRET", parse_secret);
    let allow_indexing = env.optional("ALLOW_INDEXING", parse_bool).unwrap_or(true);
    let report_only = env.optional("CSP_REPORT_ONLY", parse_bool).unwrap_or(false);
    let csp_mode = env
        .optional("CSP_MODE", |v| v.parse::<CspMode>())
        .unwrap_or(if report_only {
            CspMode::ReportOnly
        } else {
            CspMode::Enforce
        });
    let report_to = env.optional("CSP_REPORT_TO", parse_url);
    let sentry_dsn = env.optional("SENTRY_DSN", parse_url);

    let defaults = ListenerConfig::default();
    let port = env
        .optional("PORT", |v| {
            v.parse::<u16>()
                .map_err(|_| format!("expected a port number (got {:?})", v))
        })
        .unwrap_or(defaults.port);
    let host = env
        .optional("HOST", |v| {
            v.parse::<IpAddr>()
                .map_err(|_| format!("expected an IP address (got {:?})", v))
        })
        .unwrap_or(defaults.host);

    let asset_defaults = AssetsConfig::default();
    let build_dir = env
        .optional("BUILD_DIR", |v| Ok(PathBuf::from(v)))
        .unwrap_or(asset_defaults.build_dir);
    let public_dir = env
        .optional("PUBLIC_DIR", |v| Ok(PathBuf::from(v)))
        .unwrap_or(asset_defaults.public_dir);

    let supported = env
        .optional("SUPPORTED_LOCALES", parse_locales)
        .unwrap_or_else(|| LocaleConfig::default().supported);

    let shutdown_grace = env
        .optional("SHUTDOWN_GRACE_SECS", |v| {
            v.parse::<u64>()
                .map_err(|_| format!("expected a number of seconds (got {:?})", v))
        })
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(10));

    let metrics_address = env.optional("METRICS_ADDR", |v| {
        v.parse::<SocketAddr>()
            .map_err(|_| format!("expected host:port (got {:?})", v))
    });

    if !env.errors.is_empty() {
        return Err(env.errors);
    }

    // Both required fields parsed, otherwise errors would be non-empty.
    let (Some(mode), Some(session_secret)) = (mode, session_secret) else {
        return Err(env.errors);
    };

    Ok(RuntimeConfig {
        mode,
        csrf_secret: csrf_secret.unwrap_or_else(|| session_secret.clone()),
        honeypot_secret: honeypot_secret.unwrap_or_else(|| session_secret.clone()),
        session_secret,
        allow_indexing,
        csp: CspConfig {
            mode: csp_mode,
            report_to,
        },
        sentry_dsn,
        listener: ListenerConfig { host, port },
        assets: AssetsConfig {
            build_dir,
            public_dir,
        },
        locales: LocaleConfig { supported },
        shutdown_grace,
        metrics_address,
    })
}
