//! Authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use scout_core::error::{AuthError, CoreError};
use scout_store::models::principal::Principal;

use crate::auth::extract::bearer_token;
use crate::error::AppError;
use crate::sessions::session_id_from_cookie;
use crate::state::AppState;

/// Authenticated principal for routes that require a signed-in user.
///
/// Accepts an `Authorization: Bearer <access token>` header, or failing that
/// a live `scout_session` cookie opened by `POST /verify`.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.principal.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            let principal = state.tokens.authenticate_access(token).await?;
            return Ok(AuthUser { principal });
        }

        let session_id = parts
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_id_from_cookie)
            .ok_or(AuthError::MissingToken)?;

        let session = state.sessions.get(session_id).await.ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Session expired or unknown".into()))
        })?;

        let principal = state
            .store
            .find_principal(session.user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::NotFound)?;
        if principal.is_banned {
            return Err(AuthError::Banned.into());
        }

        Ok(AuthUser { principal })
    }
}
