use scout_core::types::{PrincipalId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row from the `extension_tokens` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionToken {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub token: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_active: bool,
}

impl ExtensionToken {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// DTO for issuing an extension token. The new row is always active.
#[derive(Debug, Clone, Serialize)]
pub struct NewExtensionToken {
    pub user_id: PrincipalId,
    pub token: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}
