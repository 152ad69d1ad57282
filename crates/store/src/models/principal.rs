//! Principal (profile) model and public view.

use scout_core::types::{PrincipalId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row from the `profiles` table.
///
/// **Note:** `api_key` and `legacy_token` are never serialized to responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_banned: bool,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_expires_at: Option<Timestamp>,
    #[serde(default)]
    pub api_key_subscription_id: Option<Uuid>,
    #[serde(default, skip_serializing)]
    pub legacy_token: Option<String>,
    #[serde(default)]
    pub last_active_at: Option<Timestamp>,
}

impl Principal {
    /// A fresh profile with no credentials, as the EIP creates at signup.
    pub fn new(id: PrincipalId, email: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id,
            email: email.into(),
            is_admin: false,
            is_banned: false,
            created_at,
            api_key: None,
            api_key_expires_at: None,
            api_key_subscription_id: None,
            legacy_token: None,
            last_active_at: None,
        }
    }
}

/// Public principal info embedded in gateway responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrincipalInfo {
    pub id: PrincipalId,
    pub email: String,
    pub is_admin: bool,
}

impl From<&Principal> for PrincipalInfo {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            email: p.email.clone(),
            is_admin: p.is_admin,
        }
    }
}
