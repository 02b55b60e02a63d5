//! Configuration schema definitions.
//!
//! This module defines the typed runtime configuration and the public
//! projection of it that is safe to ship to the browser.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::security::csp::{CspMode, CspOptions, PolicySet};

/// Execution mode of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Production,
    Development,
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Development => "development",
            Mode::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Mode::Production)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Mode::Production),
            "development" => Ok(Mode::Development),
            "test" => Ok(Mode::Test),
            other => Err(format!(
                "expected one of production, development, test (got {:?})",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret material. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

/// Root runtime configuration, created once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Execution mode (`APP_ENV`).
    pub mode: Mode,

    /// Signs the session cookie (`SESSION_SECRET`).
    pub session_secret: Secret,

    /// Signs the CSRF cookie (`CSRF_SECRET`, falls back to the session secret).
    pub csrf_secret: Secret,

    /// Seals the honeypot timestamp (`HONEYPOT_SECRET`, falls back to the session secret).
    pub honeypot_secret: Secret,

    /// Whether crawlers may index responses (`ALLOW_INDEXING`).
    pub allow_indexing: bool,

    /// Content-Security-Policy reporting settings.
    pub csp: CspConfig,

    /// Error monitoring DSN (`SENTRY_DSN`). Public by contract.
    pub sentry_dsn: Option<Url>,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Build output and public file locations.
    pub assets: AssetsConfig,

    /// Supported locales.
    pub locales: LocaleConfig,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_grace: Duration,

    /// Prometheus exporter bind address (`METRICS_ADDR`).
    pub metrics_address: Option<SocketAddr>,
}

/// CSP reporting configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspConfig {
    /// Enforce, report only, or both for a staged rollout
    /// (`CSP_MODE`, or `CSP_REPORT_ONLY=true` for report-only).
    pub mode: CspMode,

    /// Endpoint browsers forward violation reports to.
    pub report_to: Option<Url>,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
        }
    }
}

/// Build output locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsConfig {
    /// Build output root (`BUILD_DIR`).
    pub build_dir: PathBuf,

    /// Source of public files outside production (`PUBLIC_DIR`).
    pub public_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Locale configuration. The first supported locale is the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    pub supported: Vec<String>,
}

impl LocaleConfig {
    pub fn fallback(&self) -> &str {
        self.supported.first().map(String::as_str).unwrap_or("en")
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            supported: vec!["en".to_string()],
        }
    }
}

impl RuntimeConfig {
    /// Address the HTTP listener binds to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.listener.host, self.listener.port)
    }

    /// Root of the client build (`<build>/client`).
    pub fn client_dir(&self) -> PathBuf {
        self.assets.build_dir.join("client")
    }

    /// Fingerprinted, immutable assets (`<build>/client/assets`).
    pub fn assets_dir(&self) -> PathBuf {
        self.client_dir().join("assets")
    }

    /// Directory public files are served from in the current mode.
    pub fn public_root(&self) -> PathBuf {
        if self.mode.is_production() {
            self.client_dir()
        } else {
            self.assets.public_dir.clone()
        }
    }

    /// Server build manifest consumed by the document renderer.
    pub fn server_manifest_path(&self) -> PathBuf {
        self.assets.build_dir.join("server").join("manifest.json")
    }

    /// Inputs of the Content-Security-Policy builder.
    pub fn csp_options(&self) -> CspOptions {
        CspOptions {
            report_only: self.csp.mode == CspMode::ReportOnly,
            report_uri: self.csp.report_to.clone(),
            mode: self.mode,
            monitoring: self.sentry_dsn.is_some(),
        }
    }

    /// Policies every document carries, built once at startup.
    pub fn csp_policies(&self) -> PolicySet {
        PolicySet::build(self.csp.mode, &self.csp_options())
    }

    /// The timestamp part of the honeypot is disabled under test.
    pub fn honeypot_timestamp_enabled(&self) -> bool {
        self.mode != Mode::Test
    }

    /// Cookies carry `Secure` in production only.
    pub fn secure_cookies(&self) -> bool {
        self.mode.is_production()
    }

    /// Project to the subset that is safe to embed in a document.
    ///
    /// Never add secret fields here: the result is serialised into an
    /// inline script on every page.
    pub fn public_env(&self) -> PublicEnv {
        PublicEnv {
            mode: self.mode,
            sentry_dsn: self.sentry_dsn.as_ref().map(Url::to_string),
            allow_indexing: self.allow_indexing,
        }
    }
}

/// Client-visible environment, read by the browser runtime as `window.ENV`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicEnv {
    #[serde(rename = "MODE")]
    pub mode: Mode,

    #[serde(rename = "SENTRY_DSN", skip_serializing_if = "Option::is_none")]
    pub sentry_dsn: Option<String>,

    #[serde(rename = "ALLOW_INDEXING")]
    pub allow_indexing: bool,
}

impl PublicEnv {
    /// JSON for an inline `<script>`; `<` is escaped so the payload cannot close the tag.
    pub fn to_script_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| "{}".to_string())
            .replace('<', "\\u003c")
    }
}
