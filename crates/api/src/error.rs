use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scout_core::error::{AuthError, CoreError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`AuthError`] for token
/// failures, and adds HTTP-specific variants. Implements [`IntoResponse`] to
/// produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `scout_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A token issuance or validation failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for a token failure.
///
/// | Error                              | Status |
/// |------------------------------------|--------|
/// | `MissingToken`, `Malformed`        | 400    |
/// | `RateLimited`                      | 429    |
/// | `Banned`                           | 403    |
/// | `StoreUnavailable`                 | 503    |
/// | `Signing`                          | 500    |
/// | everything else                    | 401    |
pub fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::MissingToken | AuthError::Malformed => StatusCode::BAD_REQUEST,
        AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AuthError::Banned => StatusCode::FORBIDDEN,
        AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::InvalidSignature
        | AuthError::Expired
        | AuthError::NotFound
        | AuthError::Revoked
        | AuthError::SubscriptionInactive
        | AuthError::InvalidCredentials
        | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
    }
}

/// Message safe to return to the caller. Store and signing details stay in
/// the logs.
pub fn auth_message(err: &AuthError) -> String {
    match err {
        AuthError::StoreUnavailable(_) => "Token store unavailable".to_string(),
        AuthError::Signing(cause) => {
            tracing::error!(error = %cause, "Token signing failed");
            "An internal error occurred".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Token errors ---
            AppError::Auth(err) => (auth_status(err), err.code(), auth_message(err)),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
