//! User-Agent classification.
//!
//! Crawlers and link unfurlers get the fully rendered document in one piece;
//! browsers get the streamed shell.

use axum::http::{header, HeaderMap};

/// Lowercase substrings that mark automated clients.
const BOT_MARKERS: &[&str] = &[
    "bot",
    "crawl",
    "spider",
    "slurp",
    "facebookexternalhit",
    "embedly",
    "preview",
    "headlesschrome",
    "lighthouse",
    "pagespeed",
    "curl/",
    "wget/",
    "python-requests",
    "go-http-client",
];

/// Whether `user_agent` looks like a crawler or other automated client.
pub fn is_bot(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    BOT_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// Classify the request's `User-Agent`. A missing header is a browser.
pub fn is_bot_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_bot)
}
