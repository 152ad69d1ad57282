use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_api::auth::jwt::TokenCodec;
use scout_api::auth::manager::TokenManager;
use scout_api::auth::subscription_cache::SubscriptionCache;
use scout_api::background::reconcile::{self, PgAdminMirror, Reconciler};
use scout_api::background::token_retention;
use scout_api::config::{ServerConfig, StoreBackend};
use scout_api::router::build_app_router;
use scout_api::sessions::SessionStore;
use scout_api::state::AppState;
use scout_store::identity::RestIdentityProvider;
use scout_store::memory::{MemoryIdentityProvider, MemoryTokenStore};
use scout_store::rest::RestClient;
use scout_store::rest_store::RestTokenStore;
use scout_store::{IdentityProvider, TokenStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scout_api=debug,scout_store=debug,scout_db=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store_backend,
        "Loaded server configuration"
    );

    // --- Token store + identity provider ---
    let (store, identity): (Arc<dyn TokenStore>, Arc<dyn IdentityProvider>) =
        match config.store_backend {
            StoreBackend::Rest => {
                let eip = config
                    .eip
                    .as_ref()
                    .expect("EIP configuration is loaded for the rest backend");
                let client = RestClient::new(&eip.url, eip.service_role_key.clone());
                tracing::info!(url = %client.base_url(), "Using EIP token store");
                (
                    Arc::new(RestTokenStore::new(client)),
                    Arc::new(RestIdentityProvider::new(&eip.url, eip.anon_key.clone())),
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory token store; nothing survives a restart");
                (
                    Arc::new(MemoryTokenStore::new()),
                    Arc::new(MemoryIdentityProvider::new()),
                )
            }
        };

    // --- Token manager ---
    let tokens = Arc::new(
        TokenManager::new(
            Arc::clone(&store),
            TokenCodec::new(&config.jwt),
            config.rate_limit,
        )
        .with_extension_token_days(config.extension_token_days)
        .with_subscription_cache(SubscriptionCache::new(Duration::from_secs(
            config.subscription_cache_secs,
        ))),
    );

    let cancel = CancellationToken::new();

    // --- Admin mirror + reconciliation ---
    let (reconcile_handle, reconcile_task) = match &config.mirror_database_url {
        Some(url) => {
            let pool = scout_db::create_pool(url)
                .await
                .expect("Failed to connect to mirror database");
            scout_db::health_check(&pool)
                .await
                .expect("Mirror database health check failed");
            scout_db::run_migrations(&pool)
                .await
                .expect("Failed to run mirror migrations");

            let reconciler =
                Reconciler::new(Arc::clone(&store), Arc::new(PgAdminMirror::new(pool)));
            let (handle, task) = reconcile::spawn(
                reconciler,
                Duration::from_secs(config.reconcile_interval_secs),
                cancel.clone(),
            );
            (Some(handle), Some(task))
        }
        None => {
            tracing::info!("MIRROR_DATABASE_URL not set, admin flag mirror disabled");
            (None, None)
        }
    };

    // --- Token retention ---
    let retention_task = tokio::spawn(token_retention::run(Arc::clone(&store), cancel.clone()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        tokens,
        store,
        identity,
        sessions: Arc::new(SessionStore::new(chrono::Duration::minutes(
            config.session_ttl_mins,
        ))),
        reconcile: reconcile_handle,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_task).await;
    if let Some(task) = reconcile_task {
        let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
    }
    tracing::info!("Background jobs stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
