//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use scout_api::error::AppError;
use scout_core::error::{AuthError, CoreError};

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Principal",
        id: "42".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Principal with id 42 not found");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("Missing action".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Missing action");
}

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("secret service role key leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Token failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auth_errors_map_to_documented_statuses() {
    let cases = [
        (AuthError::MissingToken, StatusCode::BAD_REQUEST),
        (AuthError::Malformed, StatusCode::BAD_REQUEST),
        (AuthError::InvalidSignature, StatusCode::UNAUTHORIZED),
        (AuthError::Expired, StatusCode::UNAUTHORIZED),
        (AuthError::NotFound, StatusCode::UNAUTHORIZED),
        (AuthError::Revoked, StatusCode::UNAUTHORIZED),
        (AuthError::SubscriptionInactive, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidRefreshToken, StatusCode::UNAUTHORIZED),
        (AuthError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        (AuthError::Banned, StatusCode::FORBIDDEN),
    ];

    for (err, expected) in cases {
        let code = err.code();
        let message = err.to_string();
        let (status, json) = error_to_response(AppError::Auth(err)).await;
        assert_eq!(status, expected, "{code}");
        assert_eq!(json["code"], code);
        assert_eq!(json["error"], message);
    }
}

#[tokio::test]
async fn store_unavailable_returns_503_without_cause() {
    let err = AppError::Auth(AuthError::StoreUnavailable(
        "connection refused to 10.0.0.4".into(),
    ));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "STORE_UNAVAILABLE");
    assert_eq!(json["error"], "Token store unavailable");
}

#[tokio::test]
async fn signing_failure_returns_500_without_cause() {
    let err = AppError::Auth(AuthError::Signing("InvalidKeyFormat".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "SIGNING_FAILED");
    assert_eq!(json["error"], "An internal error occurred");
}
