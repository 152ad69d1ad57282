#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use scout_api::auth::jwt::{JwtConfig, TokenCodec};
use scout_api::auth::manager::TokenManager;
use scout_api::background::reconcile::{self, MemoryAdminMirror, ReconcileHandle, Reconciler};
use scout_api::config::{ServerConfig, StoreBackend};
use scout_api::router::build_app_router;
use scout_api::sessions::SessionStore;
use scout_api::state::AppState;
use scout_core::rate_limit::RateLimitPolicy;
use scout_store::memory::{MemoryIdentityProvider, MemoryTokenStore};
use scout_store::models::principal::Principal;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery staple";

/// Build a test `ServerConfig` with safe defaults and the in-memory backend.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        trusted_proxies: vec![],
        store_backend: StoreBackend::Memory,
        eip: None,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 60,
            refresh_token_expiry_days: 7,
        },
        rate_limit: RateLimitPolicy {
            max_attempts: 1_000,
            window_secs: 300,
        },
        extension_token_days: 30,
        session_ttl_mins: 60,
        subscription_cache_secs: 0,
        mirror_database_url: None,
        reconcile_interval_secs: 3600,
    }
}

/// Everything a test needs to seed data and inspect side effects.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryTokenStore>,
    pub identity: Arc<MemoryIdentityProvider>,
    pub mirror: Arc<MemoryAdminMirror>,
    pub reconcile: ReconcileHandle,
    pub cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TestApp {
    /// A fresh copy of the router (oneshot consumes it).
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Register a principal with the identity provider and the store.
    pub async fn seed_user(&self, email: &str, is_admin: bool) -> Principal {
        let mut principal = Principal::new(Uuid::new_v4(), email, Utc::now());
        principal.is_admin = is_admin;
        self.store.put_principal(principal.clone()).await;
        self.identity.register(email, PASSWORD, principal.id).await;
        principal
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

/// Build the full application router with all middleware layers over
/// in-memory backends.
///
/// Uses the same [`build_app_router`] as `main.rs`, so integration tests
/// exercise the production middleware stack.
pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryTokenStore::new());
    let identity = Arc::new(MemoryIdentityProvider::new());
    let mirror = Arc::new(MemoryAdminMirror::new());
    let cancel = CancellationToken::new();

    let tokens = TokenManager::new(store.clone(), TokenCodec::new(&config.jwt), config.rate_limit)
        .with_extension_token_days(config.extension_token_days);

    let (reconcile, _task) = reconcile::spawn(
        Reconciler::new(store.clone(), mirror.clone()),
        std::time::Duration::from_secs(config.reconcile_interval_secs),
        cancel.clone(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        tokens: Arc::new(tokens),
        store: store.clone(),
        identity: identity.clone(),
        sessions: Arc::new(SessionStore::new(chrono::Duration::minutes(
            config.session_ttl_mins,
        ))),
        reconcile: Some(reconcile.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        identity,
        mirror,
        reconcile,
        cancel,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).expect("request");
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

/// POST a JSON body as if it arrived over a connection from `peer`, with an
/// optional `X-Forwarded-For` header.
pub async fn post_json_from(
    app: Router,
    uri: &str,
    peer: &str,
    forwarded_for: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let peer: SocketAddr = format!("{peer}:40000").parse().expect("peer address");
    let mut builder = Request::post(uri)
        .header("content-type", "application/json")
        .extension(ConnectInfo(peer));
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    let request = builder.body(Body::from(body.to_string())).expect("request");
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Sign in through the gateway and return the JSON response.
pub async fn sign_in(test: &TestApp, email: &str) -> serde_json::Value {
    let response = post_json(
        test.app(),
        "/api/auth",
        serde_json::json!({ "action": "signin", "email": email, "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await
}
