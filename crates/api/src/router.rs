//! Gateway router assembly.
//!
//! [`build_app_router`] is shared by `main.rs` and `tests/common/mod.rs`, so
//! integration tests run behind the production middleware.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::handlers::extension::API_KEY_HEADER;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Browsers cache a CORS preflight answer for this long.
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Build the gateway [`Router`]: root-level endpoints kept for older
/// extension builds, the `/api` tree, and the middleware stack.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let endpoints = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::root_router())
        .nest("/api", routes::api_routes());

    with_middleware(endpoints, config).with_state(state)
}

/// Wrap `router` in the gateway middleware. Layers run outermost first:
///
/// 1. CORS (preflights never reach a handler)
/// 2. Assign an `x-request-id`
/// 3. Request span with the id attached
/// 4. Copy the id onto the response
/// 5. Timeout, answered with 408
/// 6. Panic recovery, answered with 500
fn with_middleware(router: Router<AppState>, config: &ServerConfig) -> Router<AppState> {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let timeout = Duration::from_secs(config.request_timeout_secs);

    router
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
}

/// CORS for the configured origins.
///
/// Credentials are allowed so the `scout_session` cookie set by `/verify`
/// travels with cross-origin requests. Origins were validated when the
/// configuration loaded; one that still fails to parse is skipped.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%origin, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
        .max_age(PREFLIGHT_MAX_AGE)
}

#[cfg(test)]
mod tests {
    use scout_core::rate_limit::RateLimitPolicy;

    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::config::StoreBackend;

    fn config_with_origins(origins: &[&str]) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: origins.iter().map(|o| o.to_string()).collect(),
            request_timeout_secs: 30,
            trusted_proxies: vec![],
            store_backend: StoreBackend::Memory,
            eip: None,
            jwt: JwtConfig {
                secret: "secret".into(),
                access_token_expiry_mins: 60,
                refresh_token_expiry_days: 7,
            },
            rate_limit: RateLimitPolicy::default(),
            extension_token_days: 30,
            session_ttl_mins: 60,
            subscription_cache_secs: 0,
            mirror_database_url: None,
            reconcile_interval_secs: 900,
        }
    }

    #[test]
    fn cors_layer_tolerates_unparseable_origin() {
        // Building must not panic even if validation was bypassed.
        let _layer = build_cors_layer(&config_with_origins(&["http://ok.test", "bad\norigin"]));
    }
}
