//! Form submission guard: honeypot first, then CSRF.

use axum::http::HeaderMap;
use serde::Serialize;
use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::security::csrf::Csrf;
use crate::security::honeypot::{Honeypot, HoneypotInputProps};

/// Rejected form submission. Always answered with `400`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("form body is not valid urlencoded data")]
    Malformed,
    #[error("missing honeypot input")]
    MissingHoneypot,
    #[error("honeypot input not empty")]
    HoneypotFilled,
    #[error("missing honeypot valid from input")]
    MissingHoneypotValidFrom,
    #[error("invalid honeypot valid from input")]
    InvalidHoneypotValidFrom,
    #[error("honeypot valid from is in future")]
    HoneypotValidFromInFuture,
    #[error("missing CSRF cookie")]
    MissingCsrfCookie,
    #[error("missing CSRF token in form")]
    MissingCsrfField,
    #[error("CSRF token does not match cookie")]
    CsrfMismatch,
    #[error("CSRF token signature is invalid")]
    InvalidCsrfSignature,
}

/// Decoded `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn from_pairs(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn parse(body: &[u8]) -> Result<Self, FormError> {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .map(Self::from_pairs)
            .map_err(|_| FormError::Malformed)
    }

    /// First value submitted under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Spam and forgery checks applied to every form submission.
#[derive(Debug, Clone)]
pub struct FormProtection {
    pub honeypot: Honeypot,
    pub csrf: Csrf,
}

impl FormProtection {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            honeypot: Honeypot::new(&config.honeypot_secret, config.honeypot_timestamp_enabled()),
            csrf: Csrf::new(&config.csrf_secret, config.secure_cookies()),
        }
    }

    pub fn verify(&self, headers: &HeaderMap, form: &FormData) -> Result<(), FormError> {
        self.honeypot.check(form)?;
        self.csrf.verify(headers, form)
    }

    pub fn honeypot_props(&self) -> HoneypotInputProps {
        self.honeypot.input_props()
    }
}
