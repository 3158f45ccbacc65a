//! The sync engine: single-flight coordinator over the sync passes.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::download::{download_pass, replacement_set, DownloadMode};
use crate::error::{Result, SyncError};
use crate::ledger::{LedgerStore, SyncLedger};
use crate::remote::RemoteApi;
use crate::resolver::{ConflictResolver, LastWriterWins, RecordMerger, Settlement};
use crate::result::{AttemptReport, SyncKind, SyncResult};
use crate::stats::SyncStats;
use crate::status::{StatusCell, SyncStatus};
use crate::token::TokenStore;
use crate::upload::upload_pass;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tally_core::{RecordId, RecordStore};
use tally_sync_protocol::{Conflict, ConflictResolution};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Reconciles a local record store with a remote server.
///
/// Every trigger (explicit call, timer, reconnect) goes through one admission
/// check: while an attempt is running, further requests return a skipped
/// [`SyncResult`] immediately. Sync attempts never return errors; every
/// failure is folded into the result.
///
/// # Lifecycle
///
/// 1. Construct with the collaborators.
/// 2. [`SyncEngine::init`] loads the ledger.
/// 3. Sync explicitly or via [`SyncEngine::start_auto_sync`].
/// 4. [`SyncEngine::dispose`] stops auto sync; later attempts fail until
///    `init` is called again.
pub struct SyncEngine<R: RemoteApi, S: RecordStore> {
    config: SyncConfig,
    remote: Arc<R>,
    store: Arc<S>,
    ledger_store: Arc<dyn LedgerStore>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    tokens: Arc<dyn TokenStore>,
    status: StatusCell,
    ledger: RwLock<Option<SyncLedger>>,
    resolver: ConflictResolver,
    stats: RwLock<SyncStats>,
    auto_sync: Mutex<Option<AutoSync>>,
}

struct AutoSync {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl<R: RemoteApi, S: RecordStore> SyncEngine<R, S> {
    /// Creates a new sync engine.
    pub fn new(
        config: SyncConfig,
        remote: Arc<R>,
        store: Arc<S>,
        ledger_store: Arc<dyn LedgerStore>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let status = StatusCell::new(config.status_capacity);
        let resolver = ConflictResolver::new(config.conflict_policy, Arc::new(LastWriterWins));
        Self {
            config,
            remote,
            store,
            ledger_store,
            connectivity,
            tokens,
            status,
            ledger: RwLock::new(None),
            resolver,
            stats: RwLock::new(SyncStats::default()),
            auto_sync: Mutex::new(None),
        }
    }

    /// Replaces the merger used by the `merge` policy and resolution.
    #[must_use]
    pub fn with_merger(mut self, merger: Arc<dyn RecordMerger>) -> Self {
        self.resolver = ConflictResolver::new(self.config.conflict_policy, merger);
        self
    }

    /// Loads the ledger. Must be called before the first sync.
    pub fn init(&self) -> Result<()> {
        let ledger = self.ledger_store.load()?;
        info!(
            last_full_sync_at = ?ledger.last_full_sync_at,
            last_incremental_sync_at = ?ledger.last_incremental_sync_at,
            "sync engine initialized"
        );
        *self.ledger.write() = Some(ledger);
        Ok(())
    }

    /// Stops auto sync and releases the ledger.
    pub fn dispose(&self) {
        self.stop_auto_sync();
        *self.ledger.write() = None;
        self.resolver.clear();
        info!("sync engine disposed");
    }

    /// Returns true between `init` and `dispose`.
    pub fn is_initialized(&self) -> bool {
        self.ledger.read().is_some()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote client.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Gets the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Gets the current status.
    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Gets the cached ledger, `None` before `init`.
    pub fn ledger(&self) -> Option<SyncLedger> {
        *self.ledger.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Lists conflicts waiting for a manual decision.
    pub fn pending_conflicts(&self) -> Vec<Conflict> {
        self.resolver.pending()
    }

    /// Uploads dirty records, then downloads the complete remote set.
    pub async fn perform_full_sync(&self) -> SyncResult {
        self.run(SyncKind::Full).await
    }

    /// Uploads dirty records, then downloads changes since the last sync.
    ///
    /// Falls back to a full download when no sync has completed yet.
    pub async fn perform_incremental_sync(&self) -> SyncResult {
        self.run(SyncKind::Incremental).await
    }

    /// Replaces the local store with the server's record set.
    ///
    /// Local changes not yet uploaded are discarded. The server set is
    /// installed in one write once fully downloaded; if the download fails or
    /// the attempt is dropped, the store keeps its exact prior content.
    pub async fn perform_force_sync(&self) -> SyncResult {
        self.run(SyncKind::Force).await
    }

    /// Runs the sync an automatic trigger asks for: incremental once a sync
    /// has completed, full before that.
    pub async fn perform_auto_sync(&self) -> SyncResult {
        let has_boundary = self
            .ledger
            .read()
            .is_some_and(|ledger| !ledger.is_empty());
        if has_boundary {
            self.run(SyncKind::Incremental).await
        } else {
            self.run(SyncKind::Full).await
        }
    }

    /// Settles a conflict held under the `manual` policy.
    ///
    /// Returns `Ok(true)` if the conflict is settled. `Skip` puts it back in
    /// the queue and returns `Ok(false)`; so does a local edit made since the
    /// conflict was found, except that the conflict is dropped and the next
    /// attempt re-examines the record. On error the conflict stays queued.
    pub async fn resolve_conflict(
        &self,
        record_id: RecordId,
        resolution: ConflictResolution,
    ) -> Result<bool> {
        if !self.is_initialized() {
            return Err(SyncError::NotInitialized);
        }
        if !self.status.try_reserve() {
            return Err(SyncError::Busy);
        }
        let _reservation = Reservation(&self.status);

        if resolution.pushes_to_server() {
            self.check_remote_access().await?;
        }

        let conflict = self
            .resolver
            .take(record_id)
            .ok_or(SyncError::ConflictNotFound(record_id))?;

        match self
            .resolver
            .apply(&conflict, resolution, &*self.remote, &*self.store)
            .await
        {
            Ok(Settlement::Resolved) => {
                info!(%record_id, %resolution, "conflict resolved");
                self.stats.write().conflicts_resolved += 1;
                Ok(true)
            }
            Ok(Settlement::Deferred) => {
                self.resolver.requeue(conflict);
                Ok(false)
            }
            Ok(Settlement::Stale) => {
                debug!(%record_id, "local record changed since conflict, dropped");
                Ok(false)
            }
            Err(e) => {
                warn!(%record_id, %resolution, error = %e, "conflict resolution failed");
                self.resolver.requeue(conflict);
                Err(e)
            }
        }
    }

    async fn run(&self, kind: SyncKind) -> SyncResult {
        if !self.status.try_admit() {
            debug!(%kind, "sync in progress, request skipped");
            let result = SyncResult::skipped(kind);
            self.stats.write().record(&result);
            return result;
        }
        let guard = AttemptGuard::new(&self.status);

        info!(%kind, "sync started");
        let mut report = AttemptReport::new(kind);
        let outcome = match kind {
            SyncKind::Force => self.execute_force(&mut report).await,
            SyncKind::Full | SyncKind::Incremental => self.execute(&mut report).await,
        };

        let result = match outcome {
            Ok(()) => report.finish(SyncStatus::Completed, None),
            Err(e) => {
                warn!(%kind, error = %e, "sync failed");
                report.finish(SyncStatus::Failed, Some(e.to_string()))
            }
        };
        info!(%result, "sync finished");

        self.stats.write().record(&result);
        guard.finish(result.status());
        result
    }

    async fn execute(&self, report: &mut AttemptReport) -> Result<()> {
        let ledger = self.check_preconditions().await?;

        let held = self.resolver.held();
        let mut pushed = HashMap::new();
        upload_pass(
            &*self.remote,
            &*self.store,
            &*self.connectivity,
            &held,
            &mut pushed,
            report,
        )
        .await?;

        self.ensure_online()?;
        let mode = match (report.kind(), ledger.download_boundary()) {
            (SyncKind::Incremental, Some(since)) => DownloadMode::ChangedSince(since),
            _ => DownloadMode::Full,
        };
        let mut conflicts = Vec::new();
        download_pass(
            &*self.remote,
            &*self.store,
            mode,
            &pushed,
            report,
            &mut conflicts,
        )
        .await?;

        self.resolver
            .resolve_all(conflicts, &*self.remote, &*self.store, report)
            .await?;

        self.commit_ledger(ledger, report)
    }

    async fn execute_force(&self, report: &mut AttemptReport) -> Result<()> {
        let ledger = self.check_preconditions().await?;
        info!(records = self.store.len()?, "replacing local store with server set");

        // The local store is only written once the whole set is in hand.
        let replacement = match replacement_set(&*self.remote, report).await {
            Ok(replacement) => replacement,
            Err(e) => {
                report.discard_downloads();
                return Err(e);
            }
        };
        if let Err(e) = self.store.restore(&replacement) {
            report.discard_downloads();
            return Err(e.into());
        }
        self.resolver.clear();
        info!(
            records = replacement.record_count(),
            digest = replacement.digest(),
            "local store replaced"
        );

        self.commit_ledger(ledger, report)
    }

    async fn check_preconditions(&self) -> Result<SyncLedger> {
        let ledger = self.ledger().ok_or(SyncError::NotInitialized)?;
        self.check_remote_access().await?;
        Ok(ledger)
    }

    async fn check_remote_access(&self) -> Result<()> {
        self.ensure_online()?;
        if !self.tokens.has_valid_token().await {
            return Err(SyncError::AuthenticationFailed(
                "no valid access token".into(),
            ));
        }
        Ok(())
    }

    fn ensure_online(&self) -> Result<()> {
        if self.connectivity.is_online() {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    fn commit_ledger(&self, previous: SyncLedger, report: &AttemptReport) -> Result<()> {
        let next = previous.advanced(report.kind(), report.started_at());
        self.ledger_store.save(&next)?;

        let mut cached = self.ledger.write();
        // Disposed mid-attempt: the save stands, the cache stays released.
        if cached.is_some() {
            *cached = Some(next);
        }
        debug!(
            last_incremental_sync_at = ?next.last_incremental_sync_at,
            "ledger advanced"
        );
        Ok(())
    }

    /// Stops the auto-sync task. Returns true if it was running.
    pub fn stop_auto_sync(&self) -> bool {
        match self.auto_sync.lock().take() {
            Some(auto) => {
                let running = !auto.task.is_finished();
                let _ = auto.stop.send(());
                info!("auto sync stopped");
                running
            }
            None => false,
        }
    }

    /// Returns true while the auto-sync task is running.
    pub fn is_auto_syncing(&self) -> bool {
        self.auto_sync
            .lock()
            .as_ref()
            .is_some_and(|auto| !auto.task.is_finished())
    }
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteApi + 'static,
    S: RecordStore + 'static,
{
    /// Starts syncing on the configured timer and on reconnect.
    ///
    /// The task holds a weak reference and ends when the engine is dropped.
    /// Calling this while auto sync is running has no effect.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_auto_sync(self: &Arc<Self>) -> Result<()> {
        if !self.is_initialized() {
            return Err(SyncError::NotInitialized);
        }

        let mut slot = self.auto_sync.lock();
        if slot.as_ref().is_some_and(|auto| !auto.task.is_finished()) {
            return Ok(());
        }

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(auto_sync_loop(
            Arc::downgrade(self),
            self.config.auto_sync_interval,
            self.config.sync_on_reconnect,
            self.connectivity.subscribe(),
            stop_rx,
        ));
        *slot = Some(AutoSync { stop, task });

        info!(
            interval = ?self.config.auto_sync_interval,
            on_reconnect = self.config.sync_on_reconnect,
            "auto sync started"
        );
        Ok(())
    }
}

async fn auto_sync_loop<R, S>(
    engine: Weak<SyncEngine<R, S>>,
    interval: Option<Duration>,
    on_reconnect: bool,
    mut connectivity: watch::Receiver<bool>,
    mut stop: oneshot::Receiver<()>,
) where
    R: RemoteApi + 'static,
    S: RecordStore + 'static,
{
    let mut ticker = interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });
    let mut was_online = *connectivity.borrow_and_update();
    let mut watching = true;

    loop {
        let trigger = tokio::select! {
            _ = &mut stop => break,
            _ = tick(&mut ticker) => "timer",
            changed = connectivity.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let online = *connectivity.borrow_and_update();
                let regained = online && !was_online;
                was_online = online;
                if !(regained && on_reconnect) {
                    continue;
                }
                "reconnect"
            }
        };

        let Some(engine) = engine.upgrade() else {
            break;
        };
        debug!(trigger, "auto sync triggered");
        engine.perform_auto_sync().await;
    }
    debug!("auto sync task exited");
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Returns the status cell to idle if an attempt future is dropped.
struct AttemptGuard<'a> {
    status: &'a StatusCell,
    finished: bool,
}

impl<'a> AttemptGuard<'a> {
    fn new(status: &'a StatusCell) -> Self {
        Self {
            status,
            finished: false,
        }
    }

    fn finish(mut self, terminal: SyncStatus) {
        self.finished = true;
        self.status.finish(terminal);
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.status.finish(SyncStatus::Failed);
        }
    }
}

struct Reservation<'a>(&'a StatusCell);

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}
