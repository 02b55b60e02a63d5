//! CSRF protection for form submissions.
//!
//! A random token is stored in a signed `csrf` cookie and embedded in every
//! form as the `csrf` field. A submission is accepted only when the field
//! matches the cookie and the signature verifies.

use axum::http::{HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::config::Secret;
use crate::security::form::{FormData, FormError};
use crate::security::signing::Signer;
use crate::session::cookie::{read_cookie, CookieOptions};

pub const CSRF_COOKIE: &str = "csrf";
pub const CSRF_FIELD: &str = "csrf";

/// Issues and verifies CSRF tokens.
#[derive(Debug, Clone)]
pub struct Csrf {
    signer: Signer,
    cookie: CookieOptions,
}

impl Csrf {
    pub fn new(secret: &Secret, secure: bool) -> Self {
        Self {
            signer: Signer::new(secret.as_bytes()),
            cookie: CookieOptions::lax(CSRF_COOKIE, secure),
        }
    }

    /// Mint a signed token.
    pub fn generate(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        self.signer.sign(&URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Token to embed in a rendered form.
    ///
    /// Reuses a valid cookie token so open tabs keep working; otherwise
    /// mints a new one and returns the `Set-Cookie` to send with it.
    pub fn commit_token(&self, headers: &HeaderMap) -> (String, Option<HeaderValue>) {
        if let Some(existing) = read_cookie(headers, CSRF_COOKIE) {
            if self.signer.unsign(&existing).is_some() {
                return (existing, None);
            }
        }
        let token = self.generate();
        let cookie = self.cookie.header_value(&token);
        (token, cookie)
    }

    /// Verify a submitted form against the request cookie.
    pub fn verify(&self, headers: &HeaderMap, form: &FormData) -> Result<(), FormError> {
        let cookie = read_cookie(headers, CSRF_COOKIE).ok_or(FormError::MissingCsrfCookie)?;
        let field = form.get(CSRF_FIELD).ok_or(FormError::MissingCsrfField)?;

        if !bool::from(cookie.as_bytes().ct_eq(field.as_bytes())) {
            return Err(FormError::CsrfMismatch);
        }
        if self.signer.unsign(field).is_none() {
            return Err(FormError::InvalidCsrfSignature);
        }
        Ok(())
    }
}
