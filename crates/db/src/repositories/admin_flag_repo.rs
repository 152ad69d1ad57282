//! Repository for the `admin_flags` table.

use scout_core::types::PrincipalId;
use sqlx::PgPool;

use crate::models::admin_flag::AdminFlag;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "user_id, email, is_admin, synced_at";

/// Provides reads and upserts of mirrored admin flags.
pub struct AdminFlagRepo;

impl AdminFlagRepo {
    /// Find the mirrored flag for a principal.
    pub async fn find(
        pool: &PgPool,
        user_id: PrincipalId,
    ) -> Result<Option<AdminFlag>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM admin_flags WHERE user_id = $1");
        sqlx::query_as::<_, AdminFlag>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or overwrite the mirrored flag, stamping `synced_at`.
    pub async fn upsert(
        pool: &PgPool,
        user_id: PrincipalId,
        email: &str,
        is_admin: bool,
    ) -> Result<AdminFlag, sqlx::Error> {
        let query = format!(
            "INSERT INTO admin_flags (user_id, email, is_admin, synced_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (user_id)
             DO UPDATE SET email = EXCLUDED.email,
                           is_admin = EXCLUDED.is_admin,
                           synced_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AdminFlag>(&query)
            .bind(user_id)
            .bind(email)
            .bind(is_admin)
            .fetch_one(pool)
            .await
    }

    /// All principals currently mirrored as admins.
    pub async fn list_admins(pool: &PgPool) -> Result<Vec<AdminFlag>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM admin_flags WHERE is_admin ORDER BY email");
        sqlx::query_as::<_, AdminFlag>(&query).fetch_all(pool).await
    }
}
