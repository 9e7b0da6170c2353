//! RFC 6238 time-based one-time passwords (SHA-1, 6 digits, 30 second step).

use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::{base32, AuthError};

type HmacSha1 = Hmac<Sha1>;

pub const TIME_STEP_SECS: i64 = 30;
pub const CODE_DIGITS: usize = 6;

/// Steps accepted on either side of the current one.
pub const SKEW_WINDOW_STEPS: i64 = 10;

/// Outcome of checking a submitted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Accepted,
    /// No secret is configured.
    NotConfigured,
    /// The code is not exactly six ASCII digits.
    Malformed,
    /// Well-formed but wrong, expired, or already used.
    Rejected,
    /// The configured secret could not be used.
    Fault,
}

impl Verification {
    pub fn is_success(&self) -> bool {
        matches!(self, Verification::Accepted)
    }

    /// User-facing message. Never mentions which time step was checked.
    pub fn message(&self) -> &'static str {
        match self {
            Verification::Accepted => "OTP authentication succeeded.",
            Verification::NotConfigured => "OTP is not configured.",
            Verification::Malformed => "The OTP code must be exactly 6 digits.",
            Verification::Rejected => "Invalid OTP code. Please try again.",
            Verification::Fault => "An error occurred while verifying the OTP code.",
        }
    }
}

/// The TOTP time step containing `unix_time`.
pub fn time_step(unix_time: i64) -> i64 {
    unix_time.div_euclid(TIME_STEP_SECS)
}

/// HOTP value for one counter, already truncated to six digits.
fn hotp(key: &[u8], counter: u64) -> Result<u32, AuthError> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Ok(binary % 10u32.pow(CODE_DIGITS as u32))
}

fn format_code(value: u32) -> String {
    format!("{:0width$}", value, width = CODE_DIGITS)
}

/// Generate the code for a raw key at `unix_time`.
pub fn generate_code_raw(key: &[u8], unix_time: i64) -> Result<String, AuthError> {
    let step = time_step(unix_time);
    let counter = u64::try_from(step)
        .map_err(|_| AuthError::InvalidSecret("time before the unix epoch".to_string()))?;
    Ok(format_code(hotp(key, counter)?))
}

/// Generate the code for a Base32 secret at `unix_time`.
pub fn generate_code(secret: &str, unix_time: i64) -> Result<String, AuthError> {
    generate_code_raw(&base32::decode(secret)?, unix_time)
}

/// Exactly six ASCII digits.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

/// Search the skew window in ascending offset order and return the first matching step.
fn find_matching_step(key: &[u8], code: &str, unix_time: i64) -> Result<Option<i64>, AuthError> {
    let current = time_step(unix_time);
    for offset in -SKEW_WINDOW_STEPS..=SKEW_WINDOW_STEPS {
        let step = current + offset;
        let Ok(counter) = u64::try_from(step) else {
            continue;
        };
        if format_code(hotp(key, counter)?) == code {
            tracing::debug!("TOTP matched at offset {} ({}s)", offset, offset * TIME_STEP_SECS);
            return Ok(Some(step));
        }
    }
    Ok(None)
}

/// Check `code` and return the matched time step, or the failure outcome.
pub(crate) fn match_step(code: &str, secret: Option<&str>, unix_time: i64) -> Result<i64, Verification> {
    let secret = secret.ok_or(Verification::NotConfigured)?;
    if !is_well_formed(code) {
        return Err(Verification::Malformed);
    }

    let key = base32::decode(secret).map_err(|e| {
        tracing::error!("OTP secret is unusable: {}", e);
        Verification::Fault
    })?;

    match find_matching_step(&key, code, unix_time) {
        Ok(Some(step)) => Ok(step),
        Ok(None) => Err(Verification::Rejected),
        Err(e) => {
            tracing::error!("OTP verification failed: {}", e);
            Err(Verification::Fault)
        }
    }
}

/// Verify `code` against `secret` at `unix_time` with the clock-skew window.
///
/// Stateless: a code stays valid for as long as it sits inside the window.
pub fn verify(code: &str, secret: Option<&str>, unix_time: i64) -> Verification {
    match match_step(code, secret, unix_time) {
        Ok(_) => Verification::Accepted,
        Err(outcome) => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Base32 of the ASCII seed "12345678901234567890" from RFC 6238 appendix B.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_rfc6238_sha1_vectors() {
        let cases = [
            (59, "287082"),
            (1111111109, "081804"),
            (1111111111, "050471"),
            (1234567890, "005924"),
            (2000000000, "279037"),
            (20000000000, "353130"),
        ];
        for (time, expected) in cases {
            assert_eq!(generate_code(RFC_SECRET, time).unwrap(), expected, "t={}", time);
        }
    }

    #[test]
    fn test_round_trip_at_same_time() {
        let now = 1_700_000_000;
        let code = generate_code(RFC_SECRET, now).unwrap();
        assert_eq!(verify(&code, Some(RFC_SECRET), now), Verification::Accepted);
    }

    #[test]
    fn test_skew_window_edges() {
        let now = 1_700_000_000;
        let inside = generate_code(RFC_SECRET, now - SKEW_WINDOW_STEPS * TIME_STEP_SECS).unwrap();
        assert_eq!(verify(&inside, Some(RFC_SECRET), now), Verification::Accepted);

        let later = generate_code(RFC_SECRET, now + SKEW_WINDOW_STEPS * TIME_STEP_SECS).unwrap();
        assert_eq!(verify(&later, Some(RFC_SECRET), now), Verification::Accepted);
    }

    #[test]
    fn test_code_from_an_hour_ago_is_rejected() {
        let then = 1_700_000_000;
        let code = generate_code(RFC_SECRET, then).unwrap();
        assert_eq!(verify(&code, Some(RFC_SECRET), then + 3600), Verification::Rejected);
    }

    #[test]
    fn test_malformed_codes() {
        for code in ["", "12345", "1234567", "12a456", " 12345", "１２３４５６"] {
            assert_eq!(verify(code, Some(RFC_SECRET), 59), Verification::Malformed, "{:?}", code);
        }
    }

    #[test]
    fn test_malformed_check_precedes_secret_decoding() {
        // A broken secret would be a fault, but the code shape is checked first.
        assert_eq!(verify("abc", Some("!!!"), 59), Verification::Malformed);
        assert_eq!(verify("123456", Some("!!!"), 59), Verification::Fault);
    }

    #[test]
    fn test_missing_secret() {
        assert_eq!(verify("287082", None, 59), Verification::NotConfigured);
        assert!(!Verification::NotConfigured.is_success());
    }

    #[test]
    fn test_rejection_message_is_generic() {
        let message = Verification::Rejected.message();
        assert!(!message.contains("offset"));
        assert!(!message.contains("window"));
    }
}
