//! Admin-only handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::background::reconcile::ReconcileReport;
use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReconciliationStatus {
    /// Whether the mirror (and therefore the job) is configured.
    pub enabled: bool,
    pub last_report: Option<ReconcileReport>,
}

/// GET /api/admin/reconciliation
///
/// The most recent admin-flag reconciliation report.
pub async fn reconciliation_status(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<ReconciliationStatus>> {
    let last_report = match &state.reconcile {
        Some(handle) => handle.last_report().await,
        None => None,
    };
    Ok(Json(ReconciliationStatus {
        enabled: state.reconcile.is_some(),
        last_report,
    }))
}
