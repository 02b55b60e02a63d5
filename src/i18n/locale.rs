//! Request locale resolution.

use std::cmp::Ordering;

use axum::http::{header, HeaderMap, Uri};

use crate::config::LocaleConfig;
use crate::session::cookie::read_cookie;

pub const LOCALE_COOKIE: &str = "lng";
const LOCALE_PARAM: &str = "lng";

/// Parse an `Accept-Language` header into `(tag, quality)` pairs, best first.
///
/// Entries with `q=0` or an unparsable quality are dropped.
pub fn parse_accept_language(value: &str) -> Vec<(String, f32)> {
    let mut entries: Vec<(String, f32)> = value
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.trim().split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let mut quality = 1.0;
            for param in pieces {
                if let Some(q) = param.trim().strip_prefix("q=") {
                    quality = q.trim().parse::<f32>().ok()?;
                }
            }
            (quality > 0.0).then(|| (tag.to_lowercase(), quality))
        })
        .collect();

    // Stable sort keeps header order among equal qualities.
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries
}

/// Resolves the locale of a request against the supported set.
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    supported: Vec<String>,
    fallback: String,
}

impl LocaleResolver {
    pub fn new(config: &LocaleConfig) -> Self {
        Self {
            supported: config.supported.iter().map(|l| l.to_lowercase()).collect(),
            fallback: config.fallback().to_lowercase(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> String {
        self.from_query(uri)
            .or_else(|| self.from_cookie(headers))
            .or_else(|| self.from_accept_language(headers))
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn from_query(&self, uri: &Uri) -> Option<String> {
        let query = uri.query()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find(|(k, _)| k == LOCALE_PARAM)
            .and_then(|(_, v)| self.supported_match(&v))
    }

    fn from_cookie(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, LOCALE_COOKIE).and_then(|v| self.supported_match(&v))
    }

    fn from_accept_language(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
        parse_accept_language(value)
            .into_iter()
            .find_map(|(tag, _)| self.supported_match(&tag))
    }

    /// Exact match first, then the language part of a regional tag.
    fn supported_match(&self, tag: &str) -> Option<String> {
        let tag = tag.trim().to_lowercase().replace('_', "-");
        if self.supported.contains(&tag) {
            return Some(tag);
        }
        let language = tag.split('-').next()?;
        self.supported.iter().find(|s| s.as_str() == language).cloned()
    }
}
