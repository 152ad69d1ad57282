use scout_core::types::{PrincipalId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row from the `refresh_tokens` table. Only the SHA-256 of the token is
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub created_at: Timestamp,
}

/// DTO for persisting a newly issued refresh token.
#[derive(Debug, Clone, Serialize)]
pub struct NewRefreshToken {
    pub user_id: PrincipalId,
    pub token_hash: String,
    pub expires_at: Timestamp,
}
