//! Cookie-backed session storage.
//!
//! # Design Decisions
//! - The whole record lives in the cookie: `base64url(json).signature`
//! - Missing, malformed or tampered cookies load as an empty session
//! - Every commit re-signs the record and resets the 30-day max age
//! - No cross-request locking: concurrent requests each get their own
//!   copy and the last response to reach the browser wins

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Secret;
use crate::security::signing::Signer;
use crate::session::cookie::{read_cookie, CookieOptions};

pub const SESSION_COOKIE: &str = "session";

/// If a user doesn't come back within 30 days, their session is dropped.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 30);

fn flash_key(key: &str) -> String {
    format!("__flash_{}__", key)
}

/// Key/value data carried by the session cookie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRecord {
    data: BTreeMap<String, Value>,
}

impl SessionRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug)]
struct SessionState {
    record: SessionRecord,
    dirty: bool,
    destroyed: bool,
}

/// Request-scoped handle to the session record.
///
/// Cloning shares the same record; a fresh handle is created for every
/// request by the session stage.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(record: SessionRecord) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                record,
                dirty: false,
                destroyed: false,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        // A panic mid-update leaves at worst a partially edited record.
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Read and deserialize a value. Flash values are returned without being consumed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.with(|s| {
            s.record
                .data
                .get(key)
                .or_else(|| s.record.data.get(&flash_key(key)))
                .cloned()
        })
        .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.with(|s| {
            s.record.data.insert(key.to_string(), value);
            s.dirty = true;
        });
        Ok(())
    }

    /// Store a value readable exactly once by `take_flash`.
    pub fn flash<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        self.set(&flash_key(key), value)
    }

    /// Read and remove a flash value.
    pub fn take_flash<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.with(|s| {
            let value = s.record.data.remove(&flash_key(key));
            if value.is_some() {
                s.dirty = true;
            }
            value
        })?;
        serde_json::from_value(value).ok()
    }

    /// Clear the record and expire the cookie.
    pub fn destroy(&self) {
        self.with(|s| {
            s.record = SessionRecord::default();
            s.destroyed = true;
            s.dirty = true;
        });
    }

    pub fn is_dirty(&self) -> bool {
        self.with(|s| s.dirty)
    }

    pub fn record(&self) -> SessionRecord {
        self.with(|s| s.record.clone())
    }

    fn is_destroyed(&self) -> bool {
        self.with(|s| s.destroyed)
    }
}

/// Signs, loads and commits session cookies.
#[derive(Debug, Clone)]
pub struct CookieSessionStore {
    signer: Signer,
    cookie: CookieOptions,
}

impl CookieSessionStore {
    pub fn new(secret: &Secret, secure: bool) -> Self {
        Self {
            signer: Signer::new(secret.as_bytes()),
            cookie: CookieOptions::lax(SESSION_COOKIE, secure).with_max_age(SESSION_MAX_AGE),
        }
    }

    /// Load the session for a request, empty if absent or invalid.
    pub fn load(&self, headers: &HeaderMap) -> SessionRecord {
        read_cookie(headers, SESSION_COOKIE)
            .and_then(|value| self.decode(&value))
            .unwrap_or_default()
    }

    /// Serialize and sign a record as a cookie value.
    pub fn encode(&self, record: &SessionRecord) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(record)?;
        Ok(self.signer.sign(&URL_SAFE_NO_PAD.encode(json)))
    }

    pub fn decode(&self, value: &str) -> Option<SessionRecord> {
        let payload = self.signer.unsign(value)?;
        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// `Set-Cookie` for a record, with the fixed 30-day expiry.
    pub fn commit(&self, record: &SessionRecord) -> Option<HeaderValue> {
        match self.encode(record) {
            Ok(value) => self.cookie.header_value(&value),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode session");
                None
            }
        }
    }

    /// `Set-Cookie` to send after a request, if the session changed.
    pub fn commit_if_changed(&self, session: &Session) -> Option<HeaderValue> {
        if !session.is_dirty() {
            return None;
        }
        if session.is_destroyed() {
            return HeaderValue::from_str(&self.cookie.expire()).ok();
        }
        self.commit(&session.record())
    }
}
