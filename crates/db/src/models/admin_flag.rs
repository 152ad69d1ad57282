//! Mirrored admin flag model.

use scout_core::types::{PrincipalId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `admin_flags` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AdminFlag {
    pub user_id: PrincipalId,
    pub email: String,
    pub is_admin: bool,
    pub synced_at: Timestamp,
}
