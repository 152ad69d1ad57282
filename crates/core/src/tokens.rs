//! Opaque token generation.
//!
//! API keys and extension tokens share one format: 32 random bytes rendered
//! as 64 lowercase hex characters. They carry no structure and are validated
//! only by store lookup.

use chrono::{TimeZone, Utc};
use rand::Rng;

use crate::types::Timestamp;

/// Number of random bytes behind an opaque token.
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Length of the rendered token (two hex characters per byte).
pub const OPAQUE_TOKEN_LENGTH: usize = OPAQUE_TOKEN_BYTES * 2;

/// Lifetime of an extension token in days.
pub const EXTENSION_TOKEN_DAYS: i64 = 30;

/// Generate a new random opaque token.
pub fn generate_opaque_token() -> String {
    let bytes: [u8; OPAQUE_TOKEN_BYTES] = rand::rng().random();
    hex::encode(bytes)
}

/// Whether `value` has the shape of an opaque token (64 hex characters).
pub fn is_opaque_token(value: &str) -> bool {
    value.len() == OPAQUE_TOKEN_LENGTH && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// The "effectively never" expiry used for legacy subscriptions and migrated
/// legacy tokens.
pub fn perpetual_expiry() -> Timestamp {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC)
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
