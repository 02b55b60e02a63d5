//! Cookie header parsing and `Set-Cookie` formatting.

use std::time::Duration;

use axum::http::header::{self, HeaderMap, HeaderValue};
use chrono::Utc;

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of a server-issued cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub name: &'static str,
    pub path: &'static str,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// Persistent cookie lifetime; `None` issues a browser-session cookie.
    pub max_age: Option<Duration>,
}

impl CookieOptions {
    /// HttpOnly, `Path=/`, `SameSite=Lax`.
    pub fn lax(name: &'static str, secure: bool) -> Self {
        Self {
            name,
            path: "/",
            http_only: true,
            secure,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Format a `Set-Cookie` value.
    pub fn set_cookie(&self, value: &str) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, value, self.path);

        if let Some(max_age) = self.max_age {
            let secs = max_age.as_secs();
            let expires = Utc::now() + chrono::Duration::seconds(secs as i64);
            cookie.push_str(&format!(
                "; Max-Age={}; Expires={}",
                secs,
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie
    }

    /// Format a `Set-Cookie` value that removes the cookie.
    pub fn expire(&self) -> String {
        let mut cookie = format!(
            "{}=; Path={}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.name, self.path
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie
    }

    pub fn header_value(&self, value: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.set_cookie(value)).ok()
    }
}

/// Read a cookie from all `Cookie` headers of a request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; session=abc.def"));
        headers.append(header::COOKIE, HeaderValue::from_static("lng=es"));

        assert_eq!(read_cookie(&headers, "session").as_deref(), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "lng").as_deref(), Some("es"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn set_cookie_attributes() {
        let cookie = CookieOptions::lax("session", true)
            .with_max_age(Duration::from_secs(60))
            .set_cookie("v");

        assert!(cookie.starts_with("session=v; Path=/; Max-Age=60; Expires="));
        assert!(cookie.contains("GMT; HttpOnly; Secure; SameSite=Lax"));
    }

    #[test]
    fn insecure_cookie_omits_secure() {
        let cookie = CookieOptions::lax("csrf", false).set_cookie("v");
        assert_eq!(cookie, "csrf=v; Path=/; HttpOnly; SameSite=Lax");
    }
}
