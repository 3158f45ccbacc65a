//! # Tally Sync Engine
//!
//! Offline-first synchronization of Tally records with a remote server.
//!
//! This crate provides:
//! - Single-flight sync coordinator (idle → syncing → completed/failed → idle)
//! - Upload and download passes over the local record store
//! - Conflict detection and policy-driven resolution
//! - Force sync installed as one atomic store replace
//! - Persisted sync ledger
//! - Auto sync on a timer and on reconnect
//! - HTTP remote client with token refresh and retry with exponential backoff
//!
//! ## Architecture
//!
//! The sync engine implements an **upload-then-download** model:
//! 1. Push every dirty record (create or update by `sync_id`)
//! 2. Pull server changes, full or since the ledger boundary
//! 3. Resolve dirty collisions under the conflict policy
//! 4. Advance the ledger
//!
//! ## Key Invariants
//!
//! - At most one attempt in flight; other requests are skipped, not queued
//! - Per-record failures never stop a pass
//! - The ledger only moves after a completed attempt, and only forward
//! - A failed force sync leaves the store exactly as it was

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod download;
mod engine;
mod error;
mod http;
mod ledger;
mod remote;
mod resolver;
mod result;
mod stats;
mod status;
mod token;
mod upload;

pub use config::{RemoteConfig, RetryConfig, SyncConfig};
pub use connectivity::{ConnectivityMonitor, SharedConnectivity};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use http::HttpRemoteApi;
pub use ledger::{FileLedgerStore, LedgerStore, MemoryLedgerStore, SyncLedger};
pub use remote::RemoteApi;
pub use resolver::{LastWriterWins, RecordMerger};
pub use result::{EntityCounts, SyncKind, SyncResult};
pub use stats::SyncStats;
pub use status::SyncStatus;
pub use token::{StaticTokenStore, TokenStore};
