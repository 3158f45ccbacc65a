//! In-memory fake of the records server.
//!
//! Behaves like the real backend where the engine depends on it: creates are
//! deduplicated by client ID, every write stamps a strictly increasing change
//! time, and incremental listings return records changed after a boundary.
//! Failures and latency can be injected per test.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tally_core::{Record, RecordId, SyncId, SyncableRecord};
use tally_sync_engine::{RemoteApi, Result, SyncError};

#[derive(Debug, Clone)]
struct StoredRecord {
    record: Record,
    changed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ServerState {
    records: BTreeMap<SyncId, StoredRecord>,
    by_client_id: HashMap<RecordId, SyncId>,
    next_id: u64,
    last_change: Option<DateTime<Utc>>,
    // Remaining injected failures per record.
    failing_uploads: HashMap<RecordId, u32>,
    fail_listing: bool,
}

impl ServerState {
    fn change_time(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_change {
            if now <= last {
                now = last + ChronoDuration::milliseconds(1);
            }
        }
        self.last_change = Some(now);
        now
    }

    fn insert(&mut self, mut record: Record) -> SyncId {
        self.next_id += 1;
        let sync_id = SyncId::new(format!("srv-{}", self.next_id));
        record.meta_mut().sync_id = Some(sync_id.clone());
        record.meta_mut().synced_at = None;
        let changed_at = self.change_time();
        self.by_client_id.insert(record.id(), sync_id.clone());
        self.records
            .insert(sync_id.clone(), StoredRecord { record, changed_at });
        sync_id
    }

    fn replace(&mut self, sync_id: &SyncId, mut record: Record) {
        record.meta_mut().sync_id = Some(sync_id.clone());
        record.meta_mut().synced_at = None;
        let changed_at = self.change_time();
        self.by_client_id.insert(record.id(), sync_id.clone());
        self.records
            .insert(sync_id.clone(), StoredRecord { record, changed_at });
    }
}

/// A fake records server implementing [`RemoteApi`].
#[derive(Debug)]
pub struct FakeRemote {
    state: Mutex<ServerState>,
    reachable: AtomicBool,
    latency: Mutex<Option<Duration>>,
    create_calls: AtomicU64,
    update_calls: AtomicU64,
    list_calls: AtomicU64,
}

impl FakeRemote {
    /// Creates an empty, reachable server.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            reachable: AtomicBool::new(true),
            latency: Mutex::new(None),
            create_calls: AtomicU64::new(0),
            update_calls: AtomicU64::new(0),
            list_calls: AtomicU64::new(0),
        }
    }

    /// Makes every call fail with a retryable transport error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delays every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Makes creates and updates of one record fail with a server error.
    pub fn fail_uploads_for(&self, id: RecordId) {
        self.state.lock().failing_uploads.insert(id, u32::MAX);
    }

    /// Makes the next create or update of one record fail.
    pub fn fail_next_upload_for(&self, id: RecordId) {
        self.state.lock().failing_uploads.insert(id, 1);
    }

    /// Lets uploads of a record succeed again.
    pub fn clear_upload_failure(&self, id: RecordId) {
        self.state.lock().failing_uploads.remove(&id);
    }

    /// Makes listings fail with a server error.
    pub fn set_fail_listing(&self, fail: bool) {
        self.state.lock().fail_listing = fail;
    }

    /// Stores a record as another device would. Returns its server ID.
    ///
    /// A record whose client ID is already known replaces that entry.
    pub fn server_put(&self, record: impl Into<Record>) -> SyncId {
        let record = record.into();
        let mut state = self.state.lock();
        match state.by_client_id.get(&record.id()).cloned() {
            Some(sync_id) => {
                state.replace(&sync_id, record);
                sync_id
            }
            None => state.insert(record),
        }
    }

    /// Edits a stored record in place as another device would.
    ///
    /// Returns false if no record has this server ID.
    pub fn server_edit(&self, sync_id: &SyncId, edit: impl FnOnce(&mut Record)) -> bool {
        let mut state = self.state.lock();
        let Some(mut record) = state.records.get(sync_id).map(|s| s.record.clone()) else {
            return false;
        };
        edit(&mut record);
        record.meta_mut().updated_at = Utc::now();
        state.replace(sync_id, record);
        true
    }

    /// Tombstones a stored record. Content is kept, as some servers do.
    pub fn server_delete(&self, sync_id: &SyncId) -> bool {
        self.server_edit(sync_id, |record| record.meta_mut().is_deleted = true)
    }

    /// Gets a stored record by server ID.
    pub fn get(&self, sync_id: &SyncId) -> Option<Record> {
        self.state
            .lock()
            .records
            .get(sync_id)
            .map(|s| s.record.clone())
    }

    /// Gets a stored record by client ID.
    pub fn get_by_client_id(&self, id: RecordId) -> Option<Record> {
        let state = self.state.lock();
        let sync_id = state.by_client_id.get(&id)?;
        state.records.get(sync_id).map(|s| s.record.clone())
    }

    /// Lists every stored record in server ID order.
    pub fn records(&self) -> Vec<Record> {
        self.state
            .lock()
            .records
            .values()
            .map(|s| s.record.clone())
            .collect()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns true if the server holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many creates were received.
    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Returns how many updates were received.
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Returns how many listings were received.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, counter: &AtomicU64) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::transport_retryable("connection refused"))
        }
    }

    fn check_upload(state: &mut ServerState, record: &Record) -> Result<()> {
        let Some(remaining) = state.failing_uploads.get_mut(&record.id()) else {
            return Ok(());
        };
        *remaining -= 1;
        if *remaining == 0 {
            state.failing_uploads.remove(&record.id());
        }
        Err(SyncError::ServerError(format!(
            "injected failure for {}",
            record.id()
        )))
    }
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn create(&self, record: &Record) -> Result<SyncId> {
        self.enter(&self.create_calls).await?;
        let mut state = self.state.lock();
        Self::check_upload(&mut state, record)?;

        if let Some(existing) = state.by_client_id.get(&record.id()) {
            return Ok(existing.clone());
        }
        Ok(state.insert(record.clone()))
    }

    async fn update(&self, sync_id: &SyncId, record: &Record) -> Result<()> {
        self.enter(&self.update_calls).await?;
        let mut state = self.state.lock();
        Self::check_upload(&mut state, record)?;

        if !state.records.contains_key(sync_id) {
            return Err(SyncError::Rejected {
                status: 404,
                message: format!("no record {sync_id}"),
            });
        }
        state.replace(sync_id, record.clone());
        Ok(())
    }

    async fn list_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Record>> {
        self.enter(&self.list_calls).await?;
        let state = self.state.lock();
        if state.fail_listing {
            return Err(SyncError::ServerError("injected listing failure".into()));
        }
        Ok(state
            .records
            .values()
            .filter(|s| s.changed_at > since)
            .map(|s| s.record.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        self.enter(&self.list_calls).await?;
        let state = self.state.lock();
        if state.fail_listing {
            return Err(SyncError::ServerError("injected listing failure".into()));
        }
        Ok(state.records.values().map(|s| s.record.clone()).collect())
    }
}
