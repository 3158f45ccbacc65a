//! Remote API abstraction.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::{Record, SyncId};

/// Authenticated access to the server's record set.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory fake for testing, etc.). Authentication,
/// token refresh, timeouts and transport-level retries belong to the
/// implementation.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Creates a record and returns its server ID.
    ///
    /// Must be idempotent by client ID: creating a record whose `id` the
    /// server already holds returns the existing server ID.
    async fn create(&self, record: &Record) -> Result<SyncId>;

    /// Replaces the server's version of a record.
    async fn update(&self, sync_id: &SyncId, record: &Record) -> Result<()>;

    /// Lists records changed strictly after `since`, tombstones included.
    async fn list_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Record>>;

    /// Lists every record, tombstones included.
    async fn list_all(&self) -> Result<Vec<Record>>;
}

