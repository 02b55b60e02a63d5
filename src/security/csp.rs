//! Content-Security-Policy construction.
//!
//! # Responsibilities
//! - Derive the directive set from mode and reporting configuration
//! - Render the header value for a request nonce
//! - Pair an enforced baseline with a report-only candidate during rollout
//!
//! # Design Decisions
//! - `build_policy` is pure; the nonce is a placeholder source filled in
//!   by `header_value`, so the same set serves every request
//! - Directive order is fixed, which keeps header output stable

use std::fmt;
use std::str::FromStr;

use axum::http::header::{self, HeaderName};
use url::Url;

use crate::config::Mode;

/// Monitoring vendor ingest hosts.
pub const MONITORING_HOST: &str = "*.sentry.io";
/// Font file provider.
pub const FONT_FILE_HOST: &str = "https://fonts.gstatic.com";
/// Font stylesheet provider.
pub const FONT_STYLE_HOST: &str = "https://fonts.googleapis.com";

/// Which policy headers a document carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CspMode {
    #[default]
    Enforce,
    ReportOnly,
    /// Enforced baseline plus a report-only candidate.
    Both,
}

impl CspMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CspMode::Enforce => "enforce",
            CspMode::ReportOnly => "report-only",
            CspMode::Both => "both",
        }
    }

    pub fn enforces(&self) -> bool {
        matches!(self, CspMode::Enforce | CspMode::Both)
    }

    pub fn reports(&self) -> bool {
        matches!(self, CspMode::ReportOnly | CspMode::Both)
    }
}

impl FromStr for CspMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enforce" => Ok(CspMode::Enforce),
            "report-only" => Ok(CspMode::ReportOnly),
            "both" => Ok(CspMode::Both),
            other => Err(format!(
                "expected one of enforce, report-only, both (got {:?})",
                other
            )),
        }
    }
}

impl fmt::Display for CspMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of the policy builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspOptions {
    pub report_only: bool,
    pub report_uri: Option<Url>,
    pub mode: Mode,
    /// A monitoring key is configured.
    pub monitoring: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    DefaultSrc,
    BaseUri,
    ObjectSrc,
    ConnectSrc,
    FrameSrc,
    ImgSrc,
    FontSrc,
    ScriptSrc,
    ScriptSrcAttr,
    StyleSrc,
    UpgradeInsecureRequests,
    ReportUri,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::DefaultSrc => "default-src",
            Directive::BaseUri => "base-uri",
            Directive::ObjectSrc => "object-src",
            Directive::ConnectSrc => "connect-src",
            Directive::FrameSrc => "frame-src",
            Directive::ImgSrc => "img-src",
            Directive::FontSrc => "font-src",
            Directive::ScriptSrc => "script-src",
            Directive::ScriptSrcAttr => "script-src-attr",
            Directive::StyleSrc => "style-src",
            Directive::UpgradeInsecureRequests => "upgrade-insecure-requests",
            Directive::ReportUri => "report-uri",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `'self'`
    SelfOrigin,
    /// `'none'`
    None,
    /// `'strict-dynamic'`
    StrictDynamic,
    /// `'nonce-…'`, resolved per request.
    Nonce,
    /// A scheme source such as `data:` or `ws:`.
    Scheme(&'static str),
    /// A host or URL source.
    Host(String),
}

impl Source {
    fn render(&self, nonce: &str) -> String {
        match self {
            Source::SelfOrigin => "'self'".to_string(),
            Source::None => "'none'".to_string(),
            Source::StrictDynamic => "'strict-dynamic'".to_string(),
            Source::Nonce => format!("'nonce-{}'", nonce),
            Source::Scheme(scheme) => scheme.to_string(),
            Source::Host(host) => host.clone(),
        }
    }
}

/// Ordered directive set for one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveSet {
    directives: Vec<(Directive, Vec<Source>)>,
    report_only: bool,
}

impl DirectiveSet {
    fn new(report_only: bool) -> Self {
        Self {
            directives: Vec::new(),
            report_only,
        }
    }

    fn push(&mut self, directive: Directive, sources: Vec<Source>) {
        self.directives.push((directive, sources));
    }

    /// Sources of a directive, if present.
    pub fn get(&self, directive: Directive) -> Option<&[Source]> {
        self.directives
            .iter()
            .find(|(d, _)| *d == directive)
            .map(|(_, sources)| sources.as_slice())
    }

    pub fn contains(&self, directive: Directive) -> bool {
        self.get(directive).is_some()
    }

    /// `Content-Security-Policy` or its report-only variant.
    pub fn header_name(&self) -> HeaderName {
        if self.report_only {
            header::CONTENT_SECURITY_POLICY_REPORT_ONLY
        } else {
            header::CONTENT_SECURITY_POLICY
        }
    }

    /// Render the header value with the request nonce.
    pub fn header_value(&self, nonce: &str) -> String {
        self.directives
            .iter()
            .map(|(directive, sources)| {
                if sources.is_empty() {
                    directive.as_str().to_string()
                } else {
                    let rendered: Vec<String> = sources.iter().map(|s| s.render(nonce)).collect();
                    format!("{} {}", directive, rendered.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Build the policy for the given options.
pub fn build_policy(options: &CspOptions) -> DirectiveSet {
    let mut csp = DirectiveSet::new(options.report_only);

    csp.push(Directive::DefaultSrc, vec![Source::SelfOrigin]);
    csp.push(Directive::BaseUri, vec![Source::SelfOrigin]);
    csp.push(Directive::ObjectSrc, vec![Source::None]);

    let mut connect = Vec::with_capacity(3);
    if options.mode == Mode::Development {
        connect.push(Source::Scheme("ws:"));
    }
    if options.monitoring {
        connect.push(Source::Host(MONITORING_HOST.to_string()));
    }
    connect.push(Source::SelfOrigin);
    csp.push(Directive::ConnectSrc, connect);

    csp.push(Directive::FrameSrc, vec![Source::SelfOrigin]);
    csp.push(Directive::ImgSrc, vec![Source::SelfOrigin, Source::Scheme("data:")]);
    csp.push(
        Directive::FontSrc,
        vec![Source::SelfOrigin, Source::Host(FONT_FILE_HOST.to_string())],
    );
    csp.push(
        Directive::ScriptSrc,
        vec![Source::Nonce, Source::StrictDynamic, Source::SelfOrigin],
    );
    csp.push(Directive::ScriptSrcAttr, vec![Source::Nonce]);
    csp.push(
        Directive::StyleSrc,
        vec![
            Source::SelfOrigin,
            Source::Nonce,
            Source::Host(FONT_STYLE_HOST.to_string()),
        ],
    );

    if !options.report_only {
        csp.push(Directive::UpgradeInsecureRequests, Vec::new());
    }
    if let Some(uri) = &options.report_uri {
        csp.push(Directive::ReportUri, vec![Source::Host(uri.to_string())]);
    }

    csp
}

/// Every policy attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    enforced: Option<DirectiveSet>,
    report_only: Option<DirectiveSet>,
}

impl PolicySet {
    /// Build one directive set per header `mode` asks for.
    ///
    /// `options.report_only` is ignored; each variant sets its own.
    pub fn build(mode: CspMode, options: &CspOptions) -> Self {
        let variant = |report_only| {
            build_policy(&CspOptions {
                report_only,
                ..options.clone()
            })
        };
        Self {
            enforced: mode.enforces().then(|| variant(false)),
            report_only: mode.reports().then(|| variant(true)),
        }
    }

    pub fn enforced(&self) -> Option<&DirectiveSet> {
        self.enforced.as_ref()
    }

    pub fn report_only(&self) -> Option<&DirectiveSet> {
        self.report_only.as_ref()
    }

    /// Enforced first, then report-only.
    pub fn iter(&self) -> impl Iterator<Item = &DirectiveSet> {
        self.enforced.iter().chain(self.report_only.iter())
    }
}
