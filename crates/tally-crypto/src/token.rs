//! Opaque bearer tokens.
//!
//! Refresh, password-reset and email-verification tokens are random URL-safe
//! strings handed to the client once. Only their BLAKE3 digest is stored, so
//! a database read never yields a usable token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Random bytes per opaque token.
pub const TOKEN_BYTES: usize = 32;

/// Derive-key context for stored token digests.
pub const DIGEST_CONTEXT: &str = "Tally v1 opaque-token-digest";

/// Generate a fresh URL-safe token from [`TOKEN_BYTES`] of OS randomness.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex digest under which a token is stored and looked up.
pub fn digest(token: &str) -> String {
    let mut hasher = blake3::Hasher::new_derive_key(DIGEST_CONTEXT);
    hasher.update(token.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_url_safe() {
        let token = generate();
        // 32 bytes -> 43 unpadded base64 chars
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(generate(), generate());
    }

    #[test]
    fn test_digest_deterministic() {
        let token = generate();
        assert_eq!(digest(&token), digest(&token));
        assert_eq!(digest(&token).len(), 64);
    }

    #[test]
    fn test_digest_is_domain_separated() {
        let plain = blake3::hash(b"abc").to_hex().to_string();
        assert_ne!(digest("abc"), plain);
    }
}
