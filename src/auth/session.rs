//! Signed, cookie-carried sessions.
//!
//! A token is `base64url(json) "." hex(hmac_sha256(json))`. Anything that fails
//! to decode, verify, or validate is treated exactly like having no session.

use std::sync::Mutex;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "bucketwatch-session";
pub const SESSION_DURATION_SECS: i64 = 24 * 60 * 60;

/// Reasons a stored session is not usable.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    Signature,
    #[error("unreadable payload: {0}")]
    Payload(String),
    #[error("session expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error("invalid signing key")]
    Key,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub authenticated: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of reading a session cookie.
#[derive(Debug)]
pub enum SessionLookup {
    Active(SessionToken),
    /// No cookie was sent.
    Missing,
    /// A cookie was sent but is unusable; the caller should clear it.
    Rejected(SessionError),
}

impl SessionLookup {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionLookup::Active(_))
    }

    pub fn should_clear(&self) -> bool {
        matches!(self, SessionLookup::Rejected(_))
    }
}

/// Issues and validates session tokens.
#[derive(Debug)]
pub struct SessionManager {
    key: Vec<u8>,
    /// Tokens issued at or before this instant were logged out.
    revoked_before: Mutex<Option<DateTime<Utc>>>,
    secure: bool,
}

impl SessionManager {
    pub fn new(key: &[u8], secure: bool) -> Self {
        Self {
            key: key.to_vec(),
            revoked_before: Mutex::new(None),
            secure,
        }
    }

    /// Pick the signing key: explicit key, else derived from the OTP secret, else random.
    ///
    /// Only the first two survive a restart.
    pub fn from_config(signing_key: Option<&str>, otp_secret: Option<&str>, secure: bool) -> Self {
        let key = match (signing_key, otp_secret) {
            (Some(key), _) => key.as_bytes().to_vec(),
            (None, Some(secret)) => {
                let mut hasher = Sha256::new();
                hasher.update(b"bucketwatch-session:");
                hasher.update(secret.as_bytes());
                hasher.finalize().to_vec()
            }
            (None, None) => {
                let mut key = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                key
            }
        };
        Self::new(&key, secure)
    }

    pub fn create_session(&self, now: DateTime<Utc>) -> SessionToken {
        SessionToken {
            authenticated: true,
            issued_at: now,
            expires_at: now + Duration::seconds(SESSION_DURATION_SECS),
        }
    }

    fn check(&self, token: &SessionToken, now: DateTime<Utc>) -> Result<(), SessionError> {
        let revoked = self
            .revoked_before()
            .is_some_and(|cutoff| token.issued_at <= cutoff);
        if revoked || !token.authenticated {
            return Err(SessionError::Revoked);
        }
        if now >= token.expires_at {
            return Err(SessionError::Expired);
        }
        Ok(())
    }

    pub fn is_valid(&self, token: &SessionToken, now: DateTime<Utc>) -> bool {
        self.check(token, now).is_ok()
    }

    fn revoked_before(&self) -> Option<DateTime<Utc>> {
        *self.revoked_before.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log out: every token issued at or before `now` stops validating.
    ///
    /// The cutoff lives in memory only, so a restart forgets it.
    pub fn invalidate(&self, now: DateTime<Utc>) {
        let mut cutoff = self.revoked_before.lock().unwrap_or_else(|e| e.into_inner());
        if cutoff.map_or(true, |prev| now > prev) {
            *cutoff = Some(now);
        }
        tracing::info!("Sessions issued up to {} invalidated", now.to_rfc3339());
    }

    fn sign(&self, payload: &[u8]) -> Result<HmacSha256, SessionError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.key).map_err(|_| SessionError::Key)?;
        mac.update(payload);
        Ok(mac)
    }

    pub fn encode(&self, token: &SessionToken) -> Result<String, SessionError> {
        let payload = serde_json::to_vec(token).map_err(|e| SessionError::Payload(e.to_string()))?;
        let signature = self.sign(&payload)?.finalize().into_bytes();
        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), hex::encode(signature)))
    }

    pub fn decode(&self, value: &str) -> Result<SessionToken, SessionError> {
        let (payload, signature) = value.trim().split_once('.').ok_or(SessionError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| SessionError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| SessionError::Malformed)?;

        self.sign(&payload)?
            .verify_slice(&signature)
            .map_err(|_| SessionError::Signature)?;

        serde_json::from_slice(&payload).map_err(|e| SessionError::Payload(e.to_string()))
    }

    /// Decode and validate a cookie value in one step.
    pub fn lookup(&self, cookie: Option<&str>, now: DateTime<Utc>) -> SessionLookup {
        let Some(value) = cookie else {
            return SessionLookup::Missing;
        };
        let result = self
            .decode(value)
            .and_then(|token| self.check(&token, now).map(|_| token));
        match result {
            Ok(token) => SessionLookup::Active(token),
            Err(e) => {
                tracing::debug!("Discarding session cookie: {}", e);
                SessionLookup::Rejected(e)
            }
        }
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn set_cookie(&self, token: &SessionToken) -> Result<String, SessionError> {
        Ok(format!(
            "{}={}; Max-Age={}; {}",
            SESSION_COOKIE_NAME,
            self.encode(token)?,
            SESSION_DURATION_SECS,
            self.cookie_attributes()
        ))
    }

    /// `Set-Cookie` value removing the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Max-Age=0; {}", SESSION_COOKIE_NAME, self.cookie_attributes())
    }

    fn cookie_attributes(&self) -> &'static str {
        if self.secure {
            "Path=/; HttpOnly; SameSite=Strict; Secure"
        } else {
            "Path=/; HttpOnly; SameSite=Strict"
        }
    }
}

/// Find the session cookie in a `Cookie` request header.
pub fn find_session_cookie(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE_NAME && !value.is_empty()).then_some(value)
    })
}
