use scout_core::types::Timestamp;
use serde::{Deserialize, Serialize};

/// A row from the `revoked_tokens` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    pub token_hash: String,
    pub reason: String,
    pub created_at: Timestamp,
}

/// DTO for appending a revocation entry.
#[derive(Debug, Clone, Serialize)]
pub struct NewRevokedToken {
    pub token_hash: String,
    pub reason: String,
}
