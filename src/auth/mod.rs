//! TOTP authentication and sessions.

mod base32;
mod session;
mod totp;

pub use session::*;
pub use totp::{
    generate_code, is_well_formed, time_step, verify, Verification, CODE_DIGITS, SKEW_WINDOW_STEPS,
    TIME_STEP_SECS,
};

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Authentication error types.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OTP is not configured")]
    NotConfigured,
    #[error("invalid OTP secret: {0}")]
    InvalidSecret(String),
}

/// Material an authenticator app needs to enrol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupInfo {
    pub issuer: String,
    pub provisioning_uri: String,
    pub manual_entry_key: String,
}

/// Verifies TOTP codes for the process-wide secret.
///
/// On top of the stateless window check, remembers the last accepted time step
/// and refuses any code at or before it, so a code cannot be replayed.
#[derive(Debug)]
pub struct Authenticator {
    secret: Option<String>,
    issuer: String,
    last_accepted_step: Mutex<Option<i64>>,
}

impl Authenticator {
    pub fn new(secret: Option<String>, issuer: &str) -> Self {
        Self {
            secret,
            issuer: issuer.to_string(),
            last_accepted_step: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    pub fn is_setup_required(&self) -> bool {
        self.secret.is_none()
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Verify a submitted code at `now`.
    pub fn verify(&self, code: &str, now: DateTime<Utc>) -> Verification {
        let step = match totp::match_step(code, self.secret.as_deref(), now.timestamp()) {
            Ok(step) => step,
            Err(outcome) => return outcome,
        };

        let mut last = self.last_accepted_step.lock().unwrap_or_else(|e| e.into_inner());
        if last.is_some_and(|prev| step <= prev) {
            tracing::warn!("Rejected a replayed OTP code");
            return Verification::Rejected;
        }
        *last = Some(step);
        Verification::Accepted
    }

    /// `otpauth://` URI for enrolment, or `None` without a secret.
    pub fn provisioning_uri(&self) -> Option<String> {
        let secret = self.secret.as_deref()?;
        Some(provisioning_uri(secret, &self.issuer))
    }

    pub fn setup_info(&self) -> Result<SetupInfo, AuthError> {
        let secret = self.secret.as_deref().ok_or(AuthError::NotConfigured)?;
        base32::decode(secret)?;
        Ok(SetupInfo {
            issuer: self.issuer.clone(),
            provisioning_uri: provisioning_uri(secret, &self.issuer),
            manual_entry_key: base32::normalize(secret),
        })
    }
}

/// Build the key URI understood by authenticator apps. The issuer doubles as the label.
pub fn provisioning_uri(secret: &str, issuer: &str) -> String {
    let issuer = encode_component(issuer);
    format!(
        "otpauth://totp/{issuer}?secret={}&issuer={issuer}&algorithm=SHA1&digits=6&period={}",
        base32::normalize(secret),
        TIME_STEP_SECS,
    )
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
