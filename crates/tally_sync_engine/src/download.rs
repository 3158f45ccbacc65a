//! Download pass: apply server records locally.

use crate::error::Result;
use crate::remote::RemoteApi;
use crate::result::AttemptReport;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tally_core::{Record, RecordId, RecordStore, StoreSnapshot, SyncableRecord};
use tally_sync_protocol::{Conflict, ProtocolError};
use tracing::{debug, warn};

/// Which part of the remote set to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DownloadMode {
    /// The complete remote set.
    Full,
    /// Records changed after the boundary.
    ChangedSince(DateTime<Utc>),
}

/// What happened to one downloaded record.
#[derive(Debug)]
enum Applied {
    Written,
    Echo,
    /// The local record was edited between the read and the write.
    Overtaken,
    Conflict(Box<Conflict>),
    Rejected(&'static str),
}

/// Downloads server records and writes them to the store.
///
/// Server versions replace clean local records. A server version colliding
/// with a dirty local record of different content becomes a [`Conflict`]
/// and is left for the resolver, unless it is the version this attempt
/// pushed (`pushed`): the local record was then edited during the upload and
/// stays dirty for the next attempt. A listing failure fails the pass.
pub(crate) async fn download_pass<R, S>(
    remote: &R,
    store: &S,
    mode: DownloadMode,
    pushed: &HashMap<RecordId, Record>,
    report: &mut AttemptReport,
    conflicts: &mut Vec<Conflict>,
) -> Result<()>
where
    R: RemoteApi + ?Sized,
    S: RecordStore + ?Sized,
{
    let records = match mode {
        DownloadMode::Full => remote.list_all().await?,
        DownloadMode::ChangedSince(since) => remote.list_changed_since(since).await?,
    };
    debug!(?mode, count = records.len(), "downloaded remote records");

    for record in records {
        let entity_type = record.entity_type();
        let remote_id = record.id();

        match apply_remote(store, record, pushed)? {
            Applied::Written => report.entry(entity_type).downloaded += 1,
            Applied::Echo => {
                debug!(record_id = %remote_id, "own upload listed back, newer local edit kept");
            }
            Applied::Overtaken => {
                debug!(record_id = %remote_id, "local record edited during download, left dirty");
            }
            Applied::Conflict(conflict) => {
                debug!(record_id = %conflict.record_id(), %entity_type, "conflict detected");
                conflicts.push(*conflict);
            }
            Applied::Rejected(reason) => {
                warn!(record_id = %remote_id, %entity_type, reason, "server record not applied");
                report.entry(entity_type).download_failed += 1;
            }
        }
    }

    Ok(())
}

fn apply_remote<S>(
    store: &S,
    remote: Record,
    pushed: &HashMap<RecordId, Record>,
) -> Result<Applied>
where
    S: RecordStore + ?Sized,
{
    let Some(sync_id) = remote.sync_id().cloned() else {
        return Ok(Applied::Rejected("missing sync_id"));
    };

    // Same entity: sync_id first, client id second.
    let local = match store.find_by_sync_id(&sync_id)? {
        Some(local) => Some(local),
        None => store.get(remote.id())?,
    };

    let Some(local) = local else {
        if store.upsert_if_unchanged(accept_remote(remote, None, Utc::now()), None)? {
            return Ok(Applied::Written);
        }
        return Ok(Applied::Overtaken);
    };

    if local.entity_type() != remote.entity_type() {
        return Ok(Applied::Rejected("entity type differs from local record"));
    }
    if local.sync_id().is_some_and(|id| *id != sync_id) {
        return Ok(Applied::Rejected("client id bound to another sync_id"));
    }

    if local.is_dirty() && !local.same_content(&remote) {
        let echo = pushed
            .get(&local.id())
            .is_some_and(|version| version.same_content(&remote));
        if echo {
            return Ok(Applied::Echo);
        }
        return Ok(Applied::Conflict(Box::new(Conflict::new(local, remote))));
    }

    let observed = local.meta().updated_at;
    let accepted = accept_remote(remote, Some(local.id()), Utc::now());
    if store.upsert_if_unchanged(accepted, Some(observed))? {
        Ok(Applied::Written)
    } else {
        Ok(Applied::Overtaken)
    }
}

/// Downloads the complete remote set as the content of a fresh store.
///
/// Nothing is written locally; the caller swaps the returned snapshot in as
/// one write. Fails if any server record cannot be kept, so a partial set is
/// never installed.
pub(crate) async fn replacement_set<R>(
    remote: &R,
    report: &mut AttemptReport,
) -> Result<StoreSnapshot>
where
    R: RemoteApi + ?Sized,
{
    let listed = remote.list_all().await?;
    debug!(count = listed.len(), "downloaded remote set for replacement");

    let now = Utc::now();
    let mut records = BTreeMap::new();
    for record in listed {
        let entity_type = record.entity_type();
        let remote_id = record.id();

        let reason = if record.sync_id().is_none() {
            Some("missing sync_id")
        } else if records.contains_key(&remote_id) {
            Some("client id listed twice")
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!(record_id = %remote_id, %entity_type, reason, "server record not applied");
            report.entry(entity_type).download_failed += 1;
            continue;
        }

        records.insert(remote_id, accept_remote(record, None, now));
        report.entry(entity_type).downloaded += 1;
    }

    let failures = report.download_failures();
    if failures > 0 {
        return Err(ProtocolError::invalid(format!(
            "{failures} server records could not be applied"
        ))
        .into());
    }
    Ok(StoreSnapshot::capture(records.values())?)
}

/// Prepares a server version for local storage.
///
/// Keeps the local client ID when the match was by `sync_id`, strips the
/// content of tombstones, and stamps the record as synced.
pub(crate) fn accept_remote(
    mut remote: Record,
    local_id: Option<RecordId>,
    now: DateTime<Utc>,
) -> Record {
    if let Some(id) = local_id {
        remote.set_id(id);
    }
    if remote.is_deleted() {
        remote.make_tombstone();
    }
    if let Some(sync_id) = remote.sync_id().cloned() {
        remote.meta_mut().mark_synced(sync_id, now);
    }
    remote
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Category, CategoryKind, MemoryRecordStore, SyncId};

    fn server_copy(local: &Category, sync_id: &str) -> Category {
        let mut remote = local.clone();
        remote.meta.sync_id = Some(SyncId::from(sync_id));
        remote
    }

    #[test]
    fn new_remote_record_is_inserted_clean() {
        let store = MemoryRecordStore::new();
        let remote = server_copy(&Category::new("o", "Rent", CategoryKind::Expense), "srv-1");

        assert!(matches!(
            apply_remote(&store, remote.clone().into(), &HashMap::new()).unwrap(),
            Applied::Written
        ));
        let stored = store.get(remote.id).unwrap().unwrap();
        assert!(!stored.is_dirty());
    }

    #[test]
    fn sync_id_match_keeps_local_client_id() {
        let mut local = Category::new("o", "Rent", CategoryKind::Expense);
        local.meta.mark_synced(SyncId::from("srv-1"), Utc::now());
        let store = MemoryRecordStore::with_records(vec![local.clone().into()]);

        let mut remote = Category::new("o", "Housing", CategoryKind::Expense);
        remote.meta.sync_id = Some(SyncId::from("srv-1"));

        apply_remote(&store, remote.into(), &HashMap::new()).unwrap();

        let stored = store.get(local.id).unwrap().unwrap();
        match stored {
            Record::Category(c) => assert_eq!(c.name, "Housing"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn dirty_local_with_different_content_conflicts() {
        let local = Category::new("o", "Rent", CategoryKind::Expense);
        let store = MemoryRecordStore::with_records(vec![local.clone().into()]);
        let mut remote = server_copy(&local, "srv-1");
        remote.name = "Housing".into();

        let applied = apply_remote(&store, remote.into(), &HashMap::new()).unwrap();
        assert!(matches!(applied, Applied::Conflict(_)));

        // Local untouched.
        let stored = store.get(local.id).unwrap().unwrap();
        assert!(stored.is_dirty());
    }

    #[test]
    fn own_upload_echo_is_not_a_conflict() {
        let uploaded = Category::new("o", "Rent", CategoryKind::Expense);
        let mut edited = uploaded.clone();
        edited.name = "Housing".into();
        edited.meta.sync_id = Some(SyncId::from("srv-1"));
        edited.meta.touch();
        let store = MemoryRecordStore::with_records(vec![edited.clone().into()]);

        let mut pushed = HashMap::new();
        pushed.insert(uploaded.id, Record::from(uploaded.clone()));

        let echo = server_copy(&uploaded, "srv-1");
        let applied = apply_remote(&store, echo.into(), &pushed).unwrap();
        assert!(matches!(applied, Applied::Echo));
        assert_eq!(store.get(edited.id).unwrap().unwrap(), Record::from(edited));
    }

    #[test]
    fn dirty_local_with_same_content_is_adopted() {
        let local = Category::new("o", "Rent", CategoryKind::Expense);
        let store = MemoryRecordStore::with_records(vec![local.clone().into()]);

        let remote = server_copy(&local, "srv-1");
        let applied = apply_remote(&store, remote.into(), &HashMap::new()).unwrap();
        assert!(matches!(applied, Applied::Written));
        assert!(!store.get(local.id).unwrap().unwrap().is_dirty());
    }

    #[test]
    fn tombstone_overwrites_content() {
        let mut local = Category::new("o", "Rent", CategoryKind::Expense).with_color("#00ff00");
        local.meta.mark_synced(SyncId::from("srv-1"), Utc::now());
        let store = MemoryRecordStore::with_records(vec![local.clone().into()]);

        // Server keeps stale content on its tombstone.
        let mut remote = local.clone();
        remote.meta.is_deleted = true;
        remote.meta.synced_at = None;

        apply_remote(&store, remote.into(), &HashMap::new()).unwrap();

        match store.get(local.id).unwrap().unwrap() {
            Record::Category(c) => {
                assert!(c.meta.is_deleted);
                assert!(c.name.is_empty());
                assert!(c.color.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn record_without_sync_id_is_rejected() {
        let store = MemoryRecordStore::new();
        let remote = Category::new("o", "Rent", CategoryKind::Expense);
        assert!(matches!(
            apply_remote(&store, remote.into(), &HashMap::new()).unwrap(),
            Applied::Rejected(_)
        ));
        assert!(store.is_empty().unwrap());
    }
}
