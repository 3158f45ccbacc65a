//! Sync ledger: the persisted boundary of the last successful sync.
//!
//! The ledger is read once at `init` and written only after an attempt has
//! fully completed. A failed attempt never moves it.

use crate::result::SyncKind;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_core::persist::{read_optional, write_atomic};
use tally_core::{CoreError, CoreResult};

/// Timestamps of the last successful syncs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLedger {
    /// Start of the last completed full or force sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_sync_at: Option<DateTime<Utc>>,
    /// Start of the last completed sync of any kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_incremental_sync_at: Option<DateTime<Utc>>,
}

impl SyncLedger {
    /// Returns the boundary an incremental download lists changes after.
    ///
    /// `None` means no sync ever completed and a full listing is needed.
    #[must_use]
    pub fn download_boundary(&self) -> Option<DateTime<Utc>> {
        self.last_incremental_sync_at.or(self.last_full_sync_at)
    }

    /// Returns true if no sync has ever completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.download_boundary().is_none()
    }

    /// Returns the ledger after an attempt of `kind` started at `started_at`
    /// completed.
    ///
    /// Every timestamp written is strictly greater than the one it replaces,
    /// even if the wall clock moved backwards.
    #[must_use]
    pub fn advanced(&self, kind: SyncKind, started_at: DateTime<Utc>) -> Self {
        let next = |previous: Option<DateTime<Utc>>| match previous {
            Some(prev) if started_at <= prev => prev + Duration::milliseconds(1),
            _ => started_at,
        };

        let mut ledger = *self;
        ledger.last_incremental_sync_at = Some(next(self.last_incremental_sync_at));
        if kind.is_full() {
            ledger.last_full_sync_at = Some(next(self.last_full_sync_at));
        }
        ledger
    }
}

/// Persistence for the sync ledger.
///
/// # Implementors
///
/// - [`MemoryLedgerStore`] - For testing
/// - [`FileLedgerStore`] - JSON file written atomically
pub trait LedgerStore: Send + Sync {
    /// Loads the ledger; an absent ledger is empty.
    fn load(&self) -> CoreResult<SyncLedger>;

    /// Persists the ledger.
    fn save(&self, ledger: &SyncLedger) -> CoreResult<()>;
}

/// An in-memory ledger store.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledger: RwLock<SyncLedger>,
}

impl MemoryLedgerStore {
    /// Creates an empty ledger store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `ledger`.
    #[must_use]
    pub fn with_ledger(ledger: SyncLedger) -> Self {
        Self {
            ledger: RwLock::new(ledger),
        }
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> CoreResult<SyncLedger> {
        Ok(*self.ledger.read())
    }

    fn save(&self, ledger: &SyncLedger) -> CoreResult<()> {
        *self.ledger.write() = *ledger;
        Ok(())
    }
}

/// A ledger store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    /// Creates a store at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> CoreResult<SyncLedger> {
        match read_optional(&self.path)? {
            Some(data) => serde_json::from_slice(&data).map_err(|e| {
                CoreError::invalid_format(format!("ledger {}: {e}", self.path.display()))
            }),
            None => Ok(SyncLedger::default()),
        }
    }

    fn save(&self, ledger: &SyncLedger) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(ledger)?;
        write_atomic(&self.path, &data)
    }
}
