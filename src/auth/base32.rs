//! RFC 4648 Base32 decoding for TOTP secrets.

use super::AuthError;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Strip separators and padding, uppercase the rest.
pub fn normalize(secret: &str) -> String {
    secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Decode a Base32 secret as typed into authenticator apps.
///
/// Case-insensitive; whitespace, dashes and `=` padding are ignored. Trailing
/// bits that do not fill a whole byte are dropped.
pub fn decode(secret: &str) -> Result<Vec<u8>, AuthError> {
    let normalized = normalize(secret);
    if normalized.is_empty() {
        return Err(AuthError::InvalidSecret("empty secret".to_string()));
    }

    let mut out = Vec::with_capacity(normalized.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u8;

    for c in normalized.bytes() {
        let value = ALPHABET
            .iter()
            .position(|a| *a == c)
            .ok_or_else(|| AuthError::InvalidSecret(format!("invalid base32 character {:?}", c as char)))?;

        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    Ok(out)
}
