//! # Tally Core
//!
//! Records and local storage for the Tally finance tracker.
//!
//! This crate provides:
//! - Transactions, categories and budgets as syncable records
//! - The dirty predicate deciding which records need upload
//! - Record stores (in-memory and JSON file)
//! - Checksummed store snapshots for all-or-nothing replacement
//!
//! ## Key Invariants
//!
//! - A record is dirty iff it has no `sync_id`, no `synced_at`, or
//!   `updated_at > synced_at`
//! - Deletion is a tombstone (`is_deleted`), never a hard delete
//! - Marking a record synced never hides an edit made during upload

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod persist;
mod record;
mod snapshot;
mod store;

pub use error::{CoreError, CoreResult};
pub use record::{
    Budget, BudgetPeriod, Category, CategoryKind, EntityType, Record, RecordId, SyncId, SyncMeta,
    SyncableRecord, Transaction, TransactionKind,
};
pub use snapshot::StoreSnapshot;
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};
