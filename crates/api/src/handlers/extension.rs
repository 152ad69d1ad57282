//! Handlers used by the browser extension.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use scout_core::error::AuthError;
use scout_core::types::{OpaqueKind, Timestamp};
use scout_store::models::principal::PrincipalInfo;
use serde::Serialize;

use crate::auth::extract::{extract_token, optional_json, ClientIp};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::{TokenRequest, UserResponse};
use crate::middleware::auth::AuthUser;
use crate::sessions::session_cookie;
use crate::state::AppState;

/// Header carrying the API key on `POST /api/extension_auth`.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize)]
pub struct ExtensionTokenResponse {
    pub token: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: PrincipalInfo,
    pub session_expires_at: Timestamp,
}

/// POST /api/extension_auth
///
/// Authenticate the extension with the `X-API-Key` header.
pub async fn extension_auth(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> AppResult<Json<UserResponse>> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let validated = state.tokens.validate(api_key, ip, OpaqueKind::ApiKey).await?;
    Ok(Json(UserResponse {
        success: true,
        user: PrincipalInfo::from(&validated.principal),
    }))
}

/// POST /api/extension_token
///
/// Issue a new extension token. All earlier tokens of the caller stop
/// working.
pub async fn issue_extension_token(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ExtensionTokenResponse>> {
    let issued = state.tokens.generate_extension_token(&user.principal).await?;
    Ok(Json(ExtensionTokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// POST /verify
///
/// Validate the presented credential, record activity, and open a
/// server-side session carried in the `scout_session` cookie.
pub async fn verify(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let input: TokenRequest = optional_json(&body)?;
    let token = extract_token(&headers, input.token.as_deref())?;

    let validated = state.tokens.validate(&token, ip, OpaqueKind::ApiKey).await?;
    let principal = validated.principal;

    state
        .store
        .touch_last_active(principal.id, Utc::now())
        .await
        .map_err(AuthError::from)?;

    let session = state.sessions.create(principal.id).await;
    let cookie = HeaderValue::from_str(&session_cookie(&session, state.sessions.ttl()))
        .map_err(|e| AppError::InternalError(format!("Invalid session cookie: {e}")))?;
    tracing::info!(user_id = %principal.id, kind = %validated.kind, "Session opened");

    let mut response = Json(VerifyResponse {
        success: true,
        user: PrincipalInfo::from(&principal),
        session_expires_at: session.expires_at,
    })
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}
