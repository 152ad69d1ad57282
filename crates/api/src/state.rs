use std::sync::Arc;

use scout_store::{IdentityProvider, TokenStore};

use crate::auth::manager::TokenManager;
use crate::background::reconcile::ReconcileHandle;
use crate::config::ServerConfig;
use crate::sessions::SessionStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Token Manager (validation pipeline and issuance).
    pub tokens: Arc<TokenManager>,
    /// Token store, shared with the manager and background jobs.
    pub store: Arc<dyn TokenStore>,
    /// EIP credential check used by sign-in.
    pub identity: Arc<dyn IdentityProvider>,
    /// Sessions opened by `POST /verify`.
    pub sessions: Arc<SessionStore>,
    /// Admin-flag reconciliation queue. `None` when the mirror is disabled.
    pub reconcile: Option<ReconcileHandle>,
}
