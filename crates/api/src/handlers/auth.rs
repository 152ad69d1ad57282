//! Handlers for sign-in, token validation, refresh, revocation and API keys.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use scout_core::error::{AuthError, CoreError};
use scout_core::types::{OpaqueKind, PrincipalId, Timestamp, TokenKind};
use scout_store::models::principal::{Principal, PrincipalInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::extract::{extract_token, optional_json, ClientIp};
use crate::auth::manager::TokenPair;
use crate::error::{auth_message, auth_status, AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Reason recorded when a caller revokes without giving one.
const DEFAULT_REVOKE_REASON: &str = "revoked_by_client";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/auth`. Which fields are required depends on
/// `action`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthActionRequest {
    pub action: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Validate)]
struct SignInInput {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

/// Body carrying a token for endpoints that also accept a bearer header.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeRequest {
    pub token: Option<String>,
    pub reason: Option<String>,
}

/// Successful sign-in response.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub success: bool,
    pub user: PrincipalInfo,
    pub access_token: String,
    pub refresh_token: String,
    pub api_key: String,
    pub api_key_expires_at: Timestamp,
    /// Same value as `access_token`, kept for older extension builds.
    pub jwt: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Token pair returned by the refresh flows.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl RefreshResponse {
    fn from_pair(pair: TokenPair, success: Option<bool>) -> Self {
        Self {
            success,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: PrincipalInfo,
}

/// Principal details returned by `validate_token`.
#[derive(Debug, Serialize)]
pub struct UserData {
    pub id: PrincipalId,
    pub email: String,
    pub is_admin: bool,
    pub token_kind: TokenKind,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
    pub expires_at: Timestamp,
    pub subscription_id: Uuid,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth
///
/// Dispatch on `action`: `signin`, `refresh` or `verify_api_key`.
pub async fn auth_action(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let input: AuthActionRequest = optional_json(&body)?;
    let action = input
        .action
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing action".into()))?;

    match action {
        "signin" => {
            let email = required(input.email.as_deref(), "email")?;
            let password = required(input.password.as_deref(), "password")?;
            Ok(Json(sign_in(&state, ip, email, password).await?).into_response())
        }
        "refresh" => {
            let refresh_token = required(input.refresh_token.as_deref(), "refresh_token")?;
            state.tokens.check_rate(ip).await?;
            let (_, pair) = state.tokens.refresh_tokens(refresh_token).await?;
            Ok(Json(RefreshResponse::from_pair(pair, Some(true))).into_response())
        }
        "verify_api_key" => {
            let token = extract_token(&headers, input.api_key.as_deref())?;
            let validated = state.tokens.validate(&token, ip, OpaqueKind::ApiKey).await?;
            Ok(Json(UserResponse {
                success: true,
                user: PrincipalInfo::from(&validated.principal),
            })
            .into_response())
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {other}"))),
    }
}

/// POST /validate_token, POST /api/auth/validate_token
///
/// Always answers with a `valid` flag; failures carry `message` and `code`
/// with the mapped status.
pub async fn validate_token(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input: TokenRequest = match optional_json(&body) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    let outcome = match extract_token(&headers, input.token.as_deref()) {
        Ok(token) => {
            state
                .tokens
                .validate(&token, ip, OpaqueKind::ExtensionToken)
                .await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(validated) => {
            let p = &validated.principal;
            let user_data = UserData {
                id: p.id,
                email: p.email.clone(),
                is_admin: p.is_admin,
                token_kind: validated.kind,
            };
            (
                StatusCode::OK,
                Json(serde_json::json!({ "valid": true, "user_data": user_data })),
            )
                .into_response()
        }
        Err(e) => (
            auth_status(&e),
            Json(serde_json::json!({
                "valid": false,
                "message": auth_message(&e),
                "code": e.code(),
            })),
        )
            .into_response(),
    }
}

/// POST /api/auth/refresh_token
///
/// Exchange a refresh token for a new pair. The presented token stops
/// working.
pub async fn refresh_token(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> AppResult<Json<RefreshResponse>> {
    let input: RefreshRequest = optional_json(&body)?;
    let refresh_token = input
        .refresh_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    state.tokens.check_rate(ip).await?;
    let (principal, pair) = state.tokens.refresh_tokens(refresh_token).await?;
    tracing::info!(user_id = %principal.id, "Token pair refreshed");

    Ok(Json(RefreshResponse::from_pair(pair, None)))
}

/// POST /api/auth/revoke
///
/// Revoke the presented token (bearer header or body). Returns 204. Shares
/// the per-IP attempt budget with validation, and a token the gateway never
/// issued is answered with 401 without being recorded.
pub async fn revoke(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let input: RevokeRequest = optional_json(&body)?;
    let token = extract_token(&headers, input.token.as_deref())?;
    let reason = input
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REVOKE_REASON);

    state.tokens.check_rate(ip).await?;
    state.tokens.revoke_token(&token, reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/api_key
///
/// Replace the caller's API key. Requires a signed-in user.
pub async fn issue_api_key(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiKeyResponse>> {
    let issued = state.tokens.generate_api_key(&user.principal).await?;
    Ok(Json(ApiKeyResponse {
        api_key: issued.api_key,
        expires_at: issued.expires_at,
        subscription_id: issued.subscription_id,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required<'a>(value: Option<&'a str>, field: &str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing field: {field}")))
}

/// Check credentials with the EIP, then issue an API key and a token pair.
async fn sign_in(
    state: &AppState,
    ip: std::net::IpAddr,
    email: &str,
    password: &str,
) -> AppResult<SignInResponse> {
    SignInInput {
        email: email.to_string(),
        password: password.to_string(),
    }
    .validate()
    .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    state.tokens.check_rate(ip).await?;

    let identity = state
        .identity
        .sign_in(email, password)
        .await
        .map_err(AuthError::from)?
        .ok_or(AuthError::InvalidCredentials)?;

    let principal: Principal = state
        .store
        .find_principal(identity.id)
        .await
        .map_err(AuthError::from)?
        .ok_or_else(|| {
            tracing::warn!(user_id = %identity.id, "Signed-in identity has no profile");
            AuthError::InvalidCredentials
        })?;
    if principal.is_banned {
        return Err(AuthError::Banned.into());
    }

    let api_key = state.tokens.generate_api_key(&principal).await?;
    let pair = state.tokens.generate_token_pair(&principal).await?;

    if let Some(reconcile) = &state.reconcile {
        reconcile.request(principal.id);
    }
    tracing::info!(user_id = %principal.id, "User signed in");

    Ok(SignInResponse {
        success: true,
        user: PrincipalInfo::from(&principal),
        jwt: pair.access_token.clone(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        api_key: api_key.api_key,
        api_key_expires_at: api_key.expires_at,
        expires_in: pair.expires_in,
    })
}
