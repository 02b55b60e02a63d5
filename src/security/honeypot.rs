//! Honeypot spam protection.
//!
//! Forms carry a visually hidden text input that people never fill in, plus
//! a sealed "valid from" timestamp. Bots that fill every input, or replay a
//! form with a forged timestamp, are rejected.

use chrono::Utc;
use serde::Serialize;

use crate::config::Secret;
use crate::security::form::{FormData, FormError};
use crate::security::signing::Signer;

pub const NAME_FIELD: &str = "name__confirm";
pub const VALID_FROM_FIELD: &str = "from__confirm";

/// Inputs a form must render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotInputProps {
    pub name_field_name: &'static str,
    pub valid_from_field_name: Option<&'static str>,
    pub encrypted_valid_from: String,
}

#[derive(Debug, Clone)]
pub struct Honeypot {
    signer: Signer,
    /// `false` under test, where forms are posted without rendering first.
    check_valid_from: bool,
}

impl Honeypot {
    pub fn new(secret: &Secret, check_valid_from: bool) -> Self {
        Self {
            signer: Signer::new(secret.as_bytes()),
            check_valid_from,
        }
    }

    pub fn input_props(&self) -> HoneypotInputProps {
        HoneypotInputProps {
            name_field_name: NAME_FIELD,
            valid_from_field_name: self.check_valid_from.then_some(VALID_FROM_FIELD),
            encrypted_valid_from: self.seal(Utc::now().timestamp_millis()),
        }
    }

    fn seal(&self, millis: i64) -> String {
        self.signer.sign(&millis.to_string())
    }

    /// Validate a submitted form.
    pub fn check(&self, form: &FormData) -> Result<(), FormError> {
        let name = form.get(NAME_FIELD).ok_or(FormError::MissingHoneypot)?;
        if !name.is_empty() {
            return Err(FormError::HoneypotFilled);
        }

        if !self.check_valid_from {
            return Ok(());
        }

        let sealed = form
            .get(VALID_FROM_FIELD)
            .ok_or(FormError::MissingHoneypotValidFrom)?;
        let valid_from: i64 = self
            .signer
            .unsign(sealed)
            .and_then(|v| v.parse().ok())
            .ok_or(FormError::InvalidHoneypotValidFrom)?;

        if valid_from > Utc::now().timestamp_millis() {
            return Err(FormError::HoneypotValidFromInFuture);
        }
        Ok(())
    }
}
