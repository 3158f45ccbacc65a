//! Property tests for dirty tracking and store snapshots.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use tally_core::{
    Category, CategoryKind, EntityType, MemoryRecordStore, Record, RecordStore, SyncId, SyncMeta,
    SyncableRecord,
};

fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000i64..1_900_000_000i64).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or_else(Utc::now)
    })
}

fn meta_strategy() -> impl Strategy<Value = SyncMeta> {
    (
        timestamp_strategy(),
        prop::option::of("[a-z0-9]{1,8}"),
        prop::option::of(timestamp_strategy()),
        any::<bool>(),
    )
        .prop_map(|(updated_at, sync_id, synced_at, is_deleted)| {
            let mut meta = SyncMeta::new("owner");
            meta.updated_at = updated_at;
            meta.sync_id = sync_id.map(SyncId::from);
            meta.synced_at = synced_at;
            meta.is_deleted = is_deleted;
            meta
        })
}

proptest! {
    #[test]
    fn dirty_predicate_matches_definition(meta in meta_strategy()) {
        let expected = meta.sync_id.is_none()
            || meta.synced_at.is_none()
            || meta.updated_at > meta.synced_at.unwrap_or(meta.updated_at);
        prop_assert_eq!(meta.is_dirty(), expected);
    }

    #[test]
    fn touch_always_dirties(meta in meta_strategy()) {
        let mut meta = meta;
        meta.touch();
        prop_assert!(meta.is_dirty());
    }

    #[test]
    fn mark_synced_always_cleans(meta in meta_strategy(), at in timestamp_strategy()) {
        let mut meta = meta;
        meta.mark_synced(SyncId::from("srv"), at);
        prop_assert!(!meta.is_dirty());
    }

    #[test]
    fn store_dirty_set_matches_predicate(metas in prop::collection::vec(meta_strategy(), 0..20)) {
        let store = MemoryRecordStore::new();
        for meta in &metas {
            let mut category = Category::new("owner", "c", CategoryKind::Expense);
            category.meta = meta.clone();
            store.upsert(category.into()).unwrap();
        }

        let expected = metas.iter().filter(|m| m.is_dirty()).count();
        prop_assert_eq!(store.dirty(EntityType::Category).unwrap().len(), expected);
        prop_assert!(store.dirty(EntityType::Transaction).unwrap().is_empty());
    }

    #[test]
    fn snapshot_restore_is_exact(names in prop::collection::vec("[A-Za-z ]{0,12}", 0..10)) {
        let store = MemoryRecordStore::new();
        for name in &names {
            store.upsert(Category::new("owner", name.clone(), CategoryKind::Income).into()).unwrap();
        }
        let before = store.snapshot().unwrap();

        store.upsert(Category::new("owner", "extra", CategoryKind::Expense).into()).unwrap();
        store.restore(&before).unwrap();

        let after = store.snapshot().unwrap();
        prop_assert_eq!(after.as_bytes(), before.as_bytes());
        prop_assert_eq!(store.len().unwrap(), names.len());
    }
}

#[test]
fn edit_during_upload_is_not_lost() {
    let store = MemoryRecordStore::new();
    let category = Category::new("owner", "Rent", CategoryKind::Expense);
    let id = category.id;
    store.upsert(category.into()).unwrap();

    // Upload reads the record...
    let uploaded = store.dirty(EntityType::Category).unwrap().remove(0);

    // ...the user edits it before the response arrives...
    let mut edited = store.get(id).unwrap().unwrap();
    if let Record::Category(c) = &mut edited {
        c.name = "Housing".into();
    }
    edited.touch();
    store.upsert(edited).unwrap();

    // ...and the response lands.
    let clean = store
        .mark_synced(
            id,
            SyncId::from("srv-1"),
            Utc::now() + Duration::seconds(5),
            uploaded.meta().updated_at,
        )
        .unwrap();

    assert!(!clean);
    let stored = store.get(id).unwrap().unwrap();
    assert!(stored.is_dirty());
    assert_eq!(stored.sync_id(), Some(&SyncId::from("srv-1")));
}
