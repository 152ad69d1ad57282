//! SHA-256 digests for tokens that must never be stored in plaintext.
//!
//! Refresh tokens and revocation entries are keyed by this digest.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Digest of a raw token value as stored in `refresh_tokens` and
/// `revoked_tokens`.
pub fn token_hash(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn token_hash_is_stable_and_hex() {
        let a = token_hash("some-refresh-token");
        assert_eq!(a, token_hash("some-refresh-token"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, token_hash("another-token"));
    }
}
