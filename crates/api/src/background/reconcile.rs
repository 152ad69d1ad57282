//! Admin-flag reconciliation between the EIP and the mirror database.
//!
//! The EIP profile's `is_admin` flag is authoritative. The job copies it into
//! the mirror whenever the two differ. It runs for a single principal when
//! sign-in queues a request, and for every principal on a fixed interval.
//! Every run produces a [`ReconcileReport`] that is logged and kept for
//! `GET /api/admin/reconciliation`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scout_core::types::{PrincipalId, Timestamp};
use scout_db::repositories::AdminFlagRepo;
use scout_db::DbPool;
use scout_store::models::principal::Principal;
use scout_store::{StoreError, TokenStore};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Principals fetched per page during a sweep.
const SWEEP_PAGE_SIZE: usize = 200;

/// Pending single-principal requests before new ones are dropped.
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Mirror database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mirror unavailable: {0}")]
    Unavailable(String),
}

/// Failure reconciling one principal.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Write access to the mirrored admin flags.
#[async_trait]
pub trait AdminMirror: Send + Sync + 'static {
    /// The mirrored flag, or `None` when the principal has no row yet.
    async fn admin_flag(&self, user_id: PrincipalId) -> Result<Option<bool>, MirrorError>;

    async fn set_admin_flag(
        &self,
        user_id: PrincipalId,
        email: &str,
        is_admin: bool,
    ) -> Result<(), MirrorError>;
}

/// Mirror backed by the `admin_flags` table.
#[derive(Debug, Clone)]
pub struct PgAdminMirror {
    pool: DbPool,
}

impl PgAdminMirror {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminMirror for PgAdminMirror {
    async fn admin_flag(&self, user_id: PrincipalId) -> Result<Option<bool>, MirrorError> {
        Ok(AdminFlagRepo::find(&self.pool, user_id)
            .await?
            .map(|row| row.is_admin))
    }

    async fn set_admin_flag(
        &self,
        user_id: PrincipalId,
        email: &str,
        is_admin: bool,
    ) -> Result<(), MirrorError> {
        AdminFlagRepo::upsert(&self.pool, user_id, email, is_admin).await?;
        Ok(())
    }
}

/// In-process mirror for tests and `SCOUT_STORE=memory` runs.
#[derive(Debug, Default)]
pub struct MemoryAdminMirror {
    flags: Mutex<HashMap<PrincipalId, bool>>,
    unavailable: std::sync::atomic::AtomicBool,
}

impl MemoryAdminMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: PrincipalId) -> Option<bool> {
        self.flags.lock().await.get(&user_id).copied()
    }

    /// Make every call fail with [`MirrorError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), MirrorError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MirrorError::Unavailable("mirror offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AdminMirror for MemoryAdminMirror {
    async fn admin_flag(&self, user_id: PrincipalId) -> Result<Option<bool>, MirrorError> {
        self.check()?;
        Ok(self.get(user_id).await)
    }

    async fn set_admin_flag(
        &self,
        user_id: PrincipalId,
        _email: &str,
        is_admin: bool,
    ) -> Result<(), MirrorError> {
        self.check()?;
        self.flags.lock().await.insert(user_id, is_admin);
        Ok(())
    }
}

/// What started a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileTrigger {
    SignIn,
    Sweep,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub trigger: ReconcileTrigger,
    pub checked: u64,
    pub updated: u64,
    pub failed: u64,
    pub finished_at: Timestamp,
}

impl ReconcileReport {
    fn log(&self) {
        if self.failed > 0 {
            tracing::warn!(
                trigger = ?self.trigger,
                checked = self.checked,
                updated = self.updated,
                failed = self.failed,
                "Admin flag reconciliation finished with failures"
            );
        } else {
            tracing::info!(
                trigger = ?self.trigger,
                checked = self.checked,
                updated = self.updated,
                "Admin flag reconciliation finished"
            );
        }
    }
}

#[derive(Default)]
struct Tally {
    checked: u64,
    updated: u64,
    failed: u64,
}

impl Tally {
    fn record(&mut self, user_id: PrincipalId, outcome: Result<bool, ReconcileError>) {
        self.checked += 1;
        match outcome {
            Ok(true) => self.updated += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(%user_id, error = %e, "Admin flag reconciliation failed");
                self.failed += 1;
            }
        }
    }

    fn finish(self, trigger: ReconcileTrigger) -> ReconcileReport {
        ReconcileReport {
            trigger,
            checked: self.checked,
            updated: self.updated,
            failed: self.failed,
            finished_at: Utc::now(),
        }
    }
}

/// Copies admin flags from the token store into the mirror.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn TokenStore>,
    mirror: Arc<dyn AdminMirror>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TokenStore>, mirror: Arc<dyn AdminMirror>) -> Self {
        Self { store, mirror }
    }

    /// Bring the mirror row for `principal` in line. Returns whether a write
    /// was needed.
    pub async fn reconcile_one(&self, principal: &Principal) -> Result<bool, ReconcileError> {
        let mirrored = self.mirror.admin_flag(principal.id).await?;
        if mirrored == Some(principal.is_admin) {
            return Ok(false);
        }
        self.mirror
            .set_admin_flag(principal.id, &principal.email, principal.is_admin)
            .await?;
        tracing::info!(
            user_id = %principal.id,
            is_admin = principal.is_admin,
            previous = ?mirrored,
            "Mirrored admin flag updated"
        );
        Ok(true)
    }

    /// Reconcile a single principal by id.
    pub async fn reconcile_user(&self, user_id: PrincipalId) -> ReconcileReport {
        let mut tally = Tally::default();
        match self.store.find_principal(user_id).await {
            Ok(Some(principal)) => tally.record(user_id, self.reconcile_one(&principal).await),
            Ok(None) => tracing::warn!(%user_id, "Reconcile requested for unknown principal"),
            Err(e) => tally.record(user_id, Err(e.into())),
        }
        tally.finish(ReconcileTrigger::SignIn)
    }

    /// Reconcile every principal in the store.
    pub async fn sweep(&self) -> ReconcileReport {
        let mut tally = Tally::default();
        let mut offset = 0;
        loop {
            let page = match self.store.list_principals(SWEEP_PAGE_SIZE, offset).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(offset, error = %e, "Failed to list principals for sweep");
                    tally.failed += 1;
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            offset += page.len();
            for principal in &page {
                tally.record(principal.id, self.reconcile_one(principal).await);
            }
        }
        tally.finish(ReconcileTrigger::Sweep)
    }
}

/// Queue for reconciliation requests plus the latest report.
#[derive(Clone)]
pub struct ReconcileHandle {
    tx: mpsc::Sender<PrincipalId>,
    last: Arc<RwLock<Option<ReconcileReport>>>,
}

impl ReconcileHandle {
    /// Queue `user_id` for reconciliation without waiting for it.
    ///
    /// Returns `false` (and logs) when the request could not be queued.
    pub fn request(&self, user_id: PrincipalId) -> bool {
        match self.tx.try_send(user_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%user_id, "Reconcile queue full, request dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(%user_id, "Reconcile job stopped, request dropped");
                false
            }
        }
    }

    pub async fn last_report(&self) -> Option<ReconcileReport> {
        self.last.read().await.clone()
    }
}

/// Run the reconciliation loop until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(
    reconciler: Reconciler,
    mut rx: mpsc::Receiver<PrincipalId>,
    last: Arc<RwLock<Option<ReconcileReport>>>,
    sweep_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = sweep_interval.as_secs(),
        "Admin flag reconciliation job started"
    );

    let mut interval = tokio::time::interval(sweep_interval);

    loop {
        let report = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Admin flag reconciliation job stopping");
                break;
            }
            Some(user_id) = rx.recv() => reconciler.reconcile_user(user_id).await,
            _ = interval.tick() => reconciler.sweep().await,
        };
        report.log();
        *last.write().await = Some(report);
    }
}

/// Spawn [`run`] and return the handle used to queue requests.
pub fn spawn(
    reconciler: Reconciler,
    sweep_interval: Duration,
    cancel: CancellationToken,
) -> (ReconcileHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let last = Arc::new(RwLock::new(None));
    let task = tokio::spawn(run(
        reconciler,
        rx,
        Arc::clone(&last),
        sweep_interval,
        cancel,
    ));
    (ReconcileHandle { tx, last }, task)
}

#[cfg(test)]
mod tests {
    use scout_store::memory::MemoryTokenStore;
    use uuid::Uuid;

    use super::*;

    async fn principal(store: &MemoryTokenStore, is_admin: bool) -> Principal {
        let mut p = Principal::new(Uuid::new_v4(), "p@scout.test", Utc::now());
        p.is_admin = is_admin;
        store.put_principal(p.clone()).await;
        p
    }

    #[tokio::test]
    async fn mirror_follows_store_flag() {
        let store = Arc::new(MemoryTokenStore::new());
        let mirror = Arc::new(MemoryAdminMirror::new());
        let reconciler = Reconciler::new(store.clone(), mirror.clone());
        let admin = principal(&store, true).await;

        assert!(reconciler.reconcile_one(&admin).await.expect("reconcile"));
        assert_eq!(mirror.get(admin.id).await, Some(true));
        assert!(!reconciler.reconcile_one(&admin).await.expect("no-op"));
    }

    #[tokio::test]
    async fn sweep_reports_counts() {
        let store = Arc::new(MemoryTokenStore::new());
        let mirror = Arc::new(MemoryAdminMirror::new());
        let reconciler = Reconciler::new(store.clone(), mirror.clone());
        let admin = principal(&store, true).await;
        principal(&store, false).await;
        mirror
            .set_admin_flag(admin.id, &admin.email, true)
            .await
            .expect("seed mirror");

        let report = reconciler.sweep().await;
        assert_eq!(report.trigger, ReconcileTrigger::Sweep);
        assert_eq!(report.checked, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn mirror_failures_are_counted_not_swallowed() {
        let store = Arc::new(MemoryTokenStore::new());
        let mirror = Arc::new(MemoryAdminMirror::new());
        mirror.set_unavailable(true);
        let reconciler = Reconciler::new(store.clone(), mirror.clone());
        let p = principal(&store, true).await;

        let report = reconciler.reconcile_user(p.id).await;
        assert_eq!(report.trigger, ReconcileTrigger::SignIn);
        assert_eq!(report.checked, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn queued_request_produces_report() {
        let store = Arc::new(MemoryTokenStore::new());
        let mirror = Arc::new(MemoryAdminMirror::new());
        let p = principal(&store, true).await;
        let cancel = CancellationToken::new();
        let (handle, task) = spawn(
            Reconciler::new(store.clone(), mirror.clone()),
            Duration::from_secs(3600),
            cancel.clone(),
        );

        assert!(handle.request(p.id));
        let mut mirrored = None;
        for _ in 0..50 {
            mirrored = mirror.get(p.id).await;
            if mirrored.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mirrored, Some(true));
        assert!(handle.last_report().await.is_some());

        cancel.cancel();
        task.await.expect("job exits cleanly");
        assert!(!handle.request(p.id));
    }
}
