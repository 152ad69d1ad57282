pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth                    sign-in, refresh, API-key verification
/// /auth/validate_token     token validation
/// /auth/refresh_token      refresh
/// /auth/revoke             revocation
/// /auth/api_key            API-key issuance
/// /extension_auth          extension API-key check
/// /extension_token         extension token issuance
/// /admin/reconciliation    reconciliation status
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(auth::router())
}
