//! Test fixtures and engine helpers.
//!
//! Provides sample records and a fully wired engine over in-memory
//! collaborators.

use crate::remote::FakeRemote;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tally_core::{
    Budget, BudgetPeriod, Category, CategoryKind, CoreError, CoreResult, MemoryRecordStore,
    Transaction, TransactionKind,
};
use tally_sync_engine::{
    LedgerStore, MemoryLedgerStore, RecordMerger, SharedConnectivity, StaticTokenStore,
    SyncConfig, SyncEngine, SyncLedger,
};

/// Owner used by every sample record.
pub const OWNER: &str = "owner-1";

/// Creates an expense category.
pub fn sample_category(name: &str) -> Category {
    Category::new(OWNER, name, CategoryKind::Expense)
}

/// Creates an expense transaction in USD.
pub fn sample_transaction(description: &str, amount_minor: i64) -> Transaction {
    Transaction::new(OWNER, amount_minor, "USD", description, TransactionKind::Expense)
}

/// Creates a monthly USD budget starting January 2025.
pub fn sample_budget(name: &str, limit_minor: i64) -> Budget {
    let starts_on = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
    Budget::new(OWNER, name, limit_minor, "USD", BudgetPeriod::Monthly, starts_on)
}

/// A ledger store whose saves can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyLedgerStore {
    inner: MemoryLedgerStore,
    fail_saves: AtomicBool,
}

impl FlakyLedgerStore {
    /// Creates an empty store that saves normally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl LedgerStore for FlakyLedgerStore {
    fn load(&self) -> CoreResult<SyncLedger> {
        self.inner.load()
    }

    fn save(&self, ledger: &SyncLedger) -> CoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Io(std::io::Error::other("injected save failure")));
        }
        self.inner.save(ledger)
    }
}

/// A sync engine wired to in-memory collaborators.
///
/// Fields expose every collaborator so tests can inject faults and inspect
/// state on both sides.
pub struct TestEngine {
    /// The engine, initialized.
    pub engine: Arc<SyncEngine<FakeRemote, MemoryRecordStore>>,
    /// The fake server.
    pub remote: Arc<FakeRemote>,
    /// The local store.
    pub store: Arc<MemoryRecordStore>,
    /// The ledger persistence.
    pub ledger: Arc<FlakyLedgerStore>,
    /// Connectivity, initially online.
    pub connectivity: Arc<SharedConnectivity>,
    /// Tokens, initially holding a valid token.
    pub tokens: Arc<StaticTokenStore>,
}

impl TestEngine {
    /// Creates an engine with the default policy and no timer.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default().without_auto_sync_interval())
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates an engine with a custom configuration and merger.
    pub fn with_merger(config: SyncConfig, merger: Arc<dyn RecordMerger>) -> Self {
        Self::build(config, Some(merger))
    }

    fn build(config: SyncConfig, merger: Option<Arc<dyn RecordMerger>>) -> Self {
        let remote = Arc::new(FakeRemote::new());
        let store = Arc::new(MemoryRecordStore::new());
        let ledger = Arc::new(FlakyLedgerStore::new());
        let connectivity = Arc::new(SharedConnectivity::online());
        let tokens = Arc::new(StaticTokenStore::new(Some("test-token".into())));

        let mut engine = SyncEngine::new(
            config,
            remote.clone(),
            store.clone(),
            ledger.clone(),
            connectivity.clone(),
            tokens.clone(),
        );
        if let Some(merger) = merger {
            engine = engine.with_merger(merger);
        }
        engine
            .init()
            .expect("in-memory ledger load cannot fail");

        Self {
            engine: Arc::new(engine),
            remote,
            store,
            ledger,
            connectivity,
            tokens,
        }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
