//! In-memory record store.

use crate::error::CoreResult;
use crate::record::{EntityType, Record, RecordId, SyncId};
use crate::snapshot::StoreSnapshot;
use crate::store::{RecordMap, RecordStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// An in-memory record store.
///
/// Suitable for tests and for hosts that persist records elsewhere.
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across tasks. Each operation
/// takes the internal lock for its own duration only.
///
/// # Example
///
/// ```rust
/// use tally_core::{Category, CategoryKind, EntityType, MemoryRecordStore, RecordStore};
///
/// let store = MemoryRecordStore::new();
/// store.upsert(Category::new("me", "Rent", CategoryKind::Expense).into()).unwrap();
/// assert_eq!(store.dirty(EntityType::Category).unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<RecordMap>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records.
    #[must_use]
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(RecordMap::from_records(records)),
        }
    }

    /// Returns every record, ordered by ID.
    #[must_use]
    pub fn all(&self) -> Vec<Record> {
        self.records.read().values().cloned().collect()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: RecordId) -> CoreResult<Option<Record>> {
        Ok(self.records.read().get(id))
    }

    fn find_by_sync_id(&self, sync_id: &SyncId) -> CoreResult<Option<Record>> {
        Ok(self.records.read().find_by_sync_id(sync_id))
    }

    fn list(&self, entity_type: EntityType) -> CoreResult<Vec<Record>> {
        Ok(self.records.read().list(entity_type))
    }

    fn dirty(&self, entity_type: EntityType) -> CoreResult<Vec<Record>> {
        Ok(self.records.read().dirty(entity_type))
    }

    fn upsert(&self, record: Record) -> CoreResult<()> {
        self.records.write().upsert(record);
        Ok(())
    }

    fn upsert_if_unchanged(
        &self,
        record: Record,
        observed_updated_at: Option<DateTime<Utc>>,
    ) -> CoreResult<bool> {
        Ok(self
            .records
            .write()
            .upsert_if_unchanged(record, observed_updated_at))
    }

    fn mark_synced(
        &self,
        id: RecordId,
        sync_id: SyncId,
        synced_at: DateTime<Utc>,
        observed_updated_at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        self.records
            .write()
            .mark_synced(id, sync_id, synced_at, observed_updated_at)
    }

    fn len(&self) -> CoreResult<usize> {
        Ok(self.records.read().len())
    }

    fn clear(&self) -> CoreResult<()> {
        self.records.write().clear();
        Ok(())
    }

    fn snapshot(&self) -> CoreResult<StoreSnapshot> {
        self.records.read().snapshot()
    }

    fn restore(&self, snapshot: &StoreSnapshot) -> CoreResult<()> {
        let records = snapshot.records()?;
        *self.records.write() = RecordMap::from_records(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        Budget, BudgetPeriod, Category, CategoryKind, SyncableRecord, Transaction,
        TransactionKind,
    };
    use chrono::NaiveDate;

    fn populated() -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        store
            .upsert(Category::new("owner", "Rent", CategoryKind::Expense).into())
            .unwrap();
        store
            .upsert(
                Transaction::new("owner", -80_000, "EUR", "March rent", TransactionKind::Expense)
                    .into(),
            )
            .unwrap();
        store
            .upsert(
                Budget::new(
                    "owner",
                    "Housing",
                    90_000,
                    "EUR",
                    BudgetPeriod::Monthly,
                    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                )
                .into(),
            )
            .unwrap();
        store
    }

    #[test]
    fn upsert_and_get() {
        let store = MemoryRecordStore::new();
        let category = Category::new("owner", "Rent", CategoryKind::Expense);
        let id = category.id;
        store.upsert(category.into()).unwrap();

        let fetched = store.get(id).unwrap().unwrap();
        assert_eq!(fetched.id(), id);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn dirty_is_filtered_by_type() {
        let store = populated();
        assert_eq!(store.dirty(EntityType::Category).unwrap().len(), 1);
        assert_eq!(store.dirty(EntityType::Transaction).unwrap().len(), 1);
        assert_eq!(store.dirty(EntityType::Budget).unwrap().len(), 1);
    }

    #[test]
    fn mark_synced_removes_from_dirty() {
        let store = populated();
        let record = store.dirty(EntityType::Category).unwrap().remove(0);

        let clean = store
            .mark_synced(
                record.id(),
                SyncId::from("srv-1"),
                Utc::now(),
                record.meta().updated_at,
            )
            .unwrap();

        assert!(clean);
        assert!(store.dirty(EntityType::Category).unwrap().is_empty());
        assert!(store
            .find_by_sync_id(&SyncId::from("srv-1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn snapshot_clear_restore() {
        let store = populated();
        let before = store.snapshot().unwrap();

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());

        store.restore(&before).unwrap();
        let after = store.snapshot().unwrap();
        assert_eq!(before.as_bytes(), after.as_bytes());
    }
}
