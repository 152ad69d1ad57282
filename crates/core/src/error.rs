/// Generic domain errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a token could not be issued, validated, or redeemed.
///
/// Every validation path in the gateway terminates in either a validated
/// principal or one of these variants. The HTTP layer maps each variant to a
/// status code; [`AuthError::code`] gives the stable machine-readable name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No token was provided")]
    MissingToken,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token not found")]
    NotFound,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Subscription is not active")]
    SubscriptionInactive,

    #[error("Too many attempts, try again later")]
    RateLimited,

    #[error("Account is banned")]
    Banned,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Stable upper-case code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::Malformed => "MALFORMED_TOKEN",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::Expired => "TOKEN_EXPIRED",
            AuthError::NotFound => "TOKEN_NOT_FOUND",
            AuthError::Revoked => "TOKEN_REVOKED",
            AuthError::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
            AuthError::RateLimited => "RATE_LIMITED",
            AuthError::Banned => "BANNED",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AuthError::Signing(_) => "SIGNING_FAILED",
        }
    }
}
