//! Tests for the REST adapter against a local server speaking the EIP's
//! query conventions.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use assert_matches::assert_matches;
use axum::extract::Query as QueryParams;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use scout_core::rate_limit::RateLimitPolicy;
use scout_store::identity::RestIdentityProvider;
use scout_store::models::revocation::NewRevokedToken;
use scout_store::rest::RestClient;
use scout_store::rest_store::RestTokenStore;
use scout_store::{IdentityProvider, StoreError, TokenStore};
use serde_json::{json, Value};
use uuid::Uuid;

const SERVICE_KEY: &str = "service-role-key";
const ANON_KEY: &str = "anon-key";
const KNOWN_KEY: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const PRINCIPAL_ID: &str = "6f1c1b1e-8f4c-4e2a-9d6e-6a3b2c1d0e9f";

fn authorized(headers: &HeaderMap) -> bool {
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    apikey == Some(SERVICE_KEY) && bearer == Some("Bearer service-role-key")
}

async fn profiles(
    headers: HeaderMap,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "no key" })));
    }
    if params.get("limit").map(String::as_str) != Some("1") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "limit" })));
    }
    let rows = if params.get("api_key") == Some(&format!("eq.{KNOWN_KEY}")) {
        json!([{
            "id": PRINCIPAL_ID,
            "email": "u1@scout.test",
            "is_admin": false,
            "is_banned": false,
            "created_at": "2024-01-01T00:00:00Z",
            "api_key": KNOWN_KEY,
            "api_key_expires_at": "2025-06-01T00:00:00Z",
            "api_key_subscription_id": null,
            "legacy_token": null,
            "last_active_at": null
        }])
    } else {
        json!([])
    };
    (StatusCode::OK, Json(rows))
}

async fn subscriptions() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down")
}

async fn redeem(QueryParams(params): QueryParams<HashMap<String, String>>) -> Json<Value> {
    // Simulates a row that was already revoked: the conditional filter
    // matches nothing.
    assert_eq!(params.get("is_revoked").map(String::as_str), Some("eq.false"));
    Json(json!([]))
}

/// Accepts a revocation only when the caller asked for duplicate hashes to
/// be ignored; otherwise answers like a primary-key violation.
async fn revoked_tokens(
    headers: HeaderMap,
    QueryParams(params): QueryParams<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> StatusCode {
    let prefer = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let ignores = prefer.contains("resolution=ignore-duplicates")
        && params.get("on_conflict").map(String::as_str) == Some("token_hash");
    if ignores && body["token_hash"].is_string() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}

async fn register_attempt(Json(args): Json<Value>) -> Json<Value> {
    let admitted = args["p_max_attempts"].as_u64() == Some(10) && args["p_window_secs"] == 300;
    Json(json!(admitted))
}

async fn password_grant(
    headers: HeaderMap,
    QueryParams(params): QueryParams<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let anon_ok = headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY);
    let grant_ok = params.get("grant_type").map(String::as_str) == Some("password");
    if anon_ok && grant_ok && body["password"] == "right-password" {
        (
            StatusCode::OK,
            Json(json!({
                "access_token": "eip-session",
                "user": { "id": PRINCIPAL_ID, "email": body["email"] }
            })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
    }
}

/// Start the fake EIP on an ephemeral port and return its base URL.
async fn spawn_fake_eip() -> String {
    let app = Router::new()
        .route("/rest/v1/profiles", get(profiles))
        .route("/rest/v1/subscriptions", get(subscriptions))
        .route("/rest/v1/refresh_tokens", patch(redeem))
        .route("/rest/v1/revoked_tokens", post(revoked_tokens))
        .route("/rest/v1/rpc/register_auth_attempt", post(register_attempt))
        .route("/auth/v1/token", post(password_grant));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake EIP server");
    });
    format!("http://{addr}")
}

fn store(base_url: &str) -> RestTokenStore {
    RestTokenStore::new(RestClient::new(base_url, SERVICE_KEY))
}

#[tokio::test]
async fn finds_principal_by_api_key() {
    let base = spawn_fake_eip().await;
    let principal = store(&base)
        .find_principal_by_api_key(KNOWN_KEY)
        .await
        .expect("request should succeed")
        .expect("principal should exist");

    assert_eq!(principal.id, Uuid::parse_str(PRINCIPAL_ID).expect("uuid"));
    assert_eq!(principal.email, "u1@scout.test");
    assert!(principal.api_key_expires_at.is_some());
}

#[tokio::test]
async fn zero_rows_is_none_not_error() {
    let base = spawn_fake_eip().await;
    let result = store(&base)
        .find_principal_by_api_key("unknown")
        .await
        .expect("request should succeed");
    assert!(result.is_none());
}

#[tokio::test]
async fn non_2xx_is_api_error() {
    let base = spawn_fake_eip().await;
    let err = store(&base)
        .latest_subscription(Uuid::new_v4())
        .await
        .expect_err("503 must surface as an error");
    assert_matches!(err, StoreError::Api { status: 503, ref body } if body == "upstream down");
}

#[tokio::test]
async fn transport_failure_is_request_error() {
    // Nothing listens on port 9 (discard) on a test host.
    let err = store("http://127.0.0.1:9")
        .find_principal(Uuid::new_v4())
        .await
        .expect_err("connection must fail");
    assert_matches!(err, StoreError::Request(_));
}

#[tokio::test]
async fn redeem_is_conditional_on_not_revoked() {
    let base = spawn_fake_eip().await;
    let redeemed = store(&base)
        .redeem_refresh_token(Uuid::new_v4())
        .await
        .expect("request should succeed");
    assert!(!redeemed, "no matching row means already redeemed");
}

#[tokio::test]
async fn revocation_insert_ignores_existing_hash() {
    let base = spawn_fake_eip().await;
    let store = store(&base);
    let input = NewRevokedToken {
        token_hash: "ab".repeat(32),
        reason: "logout".into(),
    };

    store.insert_revocation(&input).await.expect("first insert");
    store
        .insert_revocation(&input)
        .await
        .expect("second insert must not surface a conflict");
}

#[tokio::test]
async fn register_attempt_calls_rpc_with_policy() {
    let base = spawn_fake_eip().await;
    let admitted = store(&base)
        .register_attempt(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Utc::now(),
            &RateLimitPolicy::default(),
        )
        .await
        .expect("rpc should succeed");
    assert!(admitted);
}

#[tokio::test]
async fn identity_provider_signs_in_and_rejects() {
    let base = spawn_fake_eip().await;
    let idp = RestIdentityProvider::new(&base, ANON_KEY);

    let identity = idp
        .sign_in("u1@scout.test", "right-password")
        .await
        .expect("request should succeed")
        .expect("credentials should be accepted");
    assert_eq!(identity.email, "u1@scout.test");

    let rejected = idp
        .sign_in("u1@scout.test", "wrong")
        .await
        .expect("rejection is not a transport error");
    assert!(rejected.is_none());
}
