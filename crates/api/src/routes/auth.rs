//! Route definitions for the gateway endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{admin, auth, extension};
use crate::state::AppState;

/// Routes mounted under `/api`.
///
/// ```text
/// POST /auth                   -> auth_action (signin | refresh | verify_api_key)
/// POST /auth/validate_token    -> validate_token
/// POST /auth/refresh_token     -> refresh_token
/// POST /auth/revoke            -> revoke
/// POST /auth/api_key           -> issue_api_key (requires auth)
/// POST /extension_auth         -> extension_auth (X-API-Key)
/// POST /extension_token        -> issue_extension_token (requires auth)
/// GET  /admin/reconciliation   -> reconciliation_status (requires admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", post(auth::auth_action))
        .route("/auth/validate_token", post(auth::validate_token))
        .route("/auth/refresh_token", post(auth::refresh_token))
        .route("/auth/revoke", post(auth::revoke))
        .route("/auth/api_key", post(auth::issue_api_key))
        .route("/extension_auth", post(extension::extension_auth))
        .route("/extension_token", post(extension::issue_extension_token))
        .route("/admin/reconciliation", get(admin::reconciliation_status))
}

/// Routes served at the root for older extension builds.
///
/// ```text
/// POST /validate_token  -> validate_token
/// POST /verify          -> verify
/// ```
pub fn root_router() -> Router<AppState> {
    Router::new()
        .route("/validate_token", post(auth::validate_token))
        .route("/verify", post(extension::verify))
}
