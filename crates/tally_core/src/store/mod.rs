//! Local record stores.
//!
//! The store owns record content. The sync engine reads dirty records from
//! it, writes downloaded versions into it and stamps sync markers on it, one
//! record at a time.

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use crate::error::{CoreError, CoreResult};
use crate::record::{EntityType, Record, RecordId, SyncId, SyncableRecord};
use crate::snapshot::StoreSnapshot;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Storage for syncable records, keyed by client ID.
///
/// # Invariants
///
/// - Every operation is atomic per record; concurrent upserts of different
///   records never interfere
/// - `dirty` never omits a record whose content changed since its last sync
/// - `mark_synced` never cleans a record edited after it was read for upload
/// - `upsert_if_unchanged` never replaces a record edited after it was read
/// - `restore` replaces the whole content with exactly the snapshot's records
///
/// # Implementors
///
/// - [`MemoryRecordStore`] - For testing and ephemeral use
/// - [`FileRecordStore`] - JSON file persisted on every write
pub trait RecordStore: Send + Sync {
    /// Gets a record by client ID, tombstones included.
    fn get(&self, id: RecordId) -> CoreResult<Option<Record>>;

    /// Finds the record carrying a server ID.
    fn find_by_sync_id(&self, sync_id: &SyncId) -> CoreResult<Option<Record>>;

    /// Lists every record of one type, tombstones included.
    fn list(&self, entity_type: EntityType) -> CoreResult<Vec<Record>>;

    /// Lists the dirty records of one type.
    fn dirty(&self, entity_type: EntityType) -> CoreResult<Vec<Record>>;

    /// Inserts or replaces a record by client ID.
    fn upsert(&self, record: Record) -> CoreResult<()>;

    /// Writes a record only if the stored version is still the one read.
    ///
    /// `observed_updated_at` is the `updated_at` of the stored record when it
    /// was read, or `None` if no record with this client ID existed. The
    /// check and the write happen under one lock.
    ///
    /// Returns false, leaving the store untouched, if the record was edited,
    /// created or removed since.
    fn upsert_if_unchanged(
        &self,
        record: Record,
        observed_updated_at: Option<DateTime<Utc>>,
    ) -> CoreResult<bool>;

    /// Stamps a successful upload.
    ///
    /// `observed_updated_at` is the `updated_at` of the version that was
    /// uploaded. If the stored record has been edited since, only the
    /// `sync_id` is recorded and the record stays dirty.
    ///
    /// Returns true if the record is now clean.
    fn mark_synced(
        &self,
        id: RecordId,
        sync_id: SyncId,
        synced_at: DateTime<Utc>,
        observed_updated_at: DateTime<Utc>,
    ) -> CoreResult<bool>;

    /// Returns the number of stored records.
    fn len(&self) -> CoreResult<usize>;

    /// Returns true if the store holds no records.
    fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every record.
    fn clear(&self) -> CoreResult<()>;

    /// Captures every record.
    fn snapshot(&self) -> CoreResult<StoreSnapshot>;

    /// Replaces the content with a snapshot's records.
    fn restore(&self, snapshot: &StoreSnapshot) -> CoreResult<()>;
}

/// Ordered record map shared by the store implementations.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordMap {
    records: BTreeMap<RecordId, Record>,
}

impl RecordMap {
    pub(crate) fn from_records(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id(), r)).collect(),
        }
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<Record> {
        self.records.get(&id).cloned()
    }

    pub(crate) fn find_by_sync_id(&self, sync_id: &SyncId) -> Option<Record> {
        self.records
            .values()
            .find(|r| r.sync_id() == Some(sync_id))
            .cloned()
    }

    pub(crate) fn list(&self, entity_type: EntityType) -> Vec<Record> {
        self.records
            .values()
            .filter(|r| r.entity_type() == entity_type)
            .cloned()
            .collect()
    }

    pub(crate) fn dirty(&self, entity_type: EntityType) -> Vec<Record> {
        self.records
            .values()
            .filter(|r| r.entity_type() == entity_type && r.is_dirty())
            .cloned()
            .collect()
    }

    pub(crate) fn upsert(&mut self, record: Record) {
        self.records.insert(record.id(), record);
    }

    pub(crate) fn upsert_if_unchanged(
        &mut self,
        record: Record,
        observed_updated_at: Option<DateTime<Utc>>,
    ) -> bool {
        let current = self.records.get(&record.id()).map(|r| r.meta().updated_at);
        if current != observed_updated_at {
            return false;
        }
        self.upsert(record);
        true
    }

    pub(crate) fn mark_synced(
        &mut self,
        id: RecordId,
        sync_id: SyncId,
        synced_at: DateTime<Utc>,
        observed_updated_at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(CoreError::RecordNotFound(id))?;
        let meta = record.meta_mut();

        if meta.updated_at != observed_updated_at {
            meta.sync_id = Some(sync_id);
            return Ok(false);
        }

        meta.mark_synced(sync_id, synced_at);
        Ok(true)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub(crate) fn snapshot(&self) -> CoreResult<StoreSnapshot> {
        StoreSnapshot::capture(self.records.values())
    }
}
