//! Conflict resolution.

use crate::download::accept_remote;
use crate::error::Result;
use crate::remote::RemoteApi;
use crate::result::AttemptReport;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tally_core::{Record, RecordId, RecordStore, SyncableRecord};
use tally_sync_protocol::{Conflict, ConflictPolicy, ConflictResolution, ProtocolError};
use tracing::{debug, warn};

/// Produces the merged version of a conflict.
///
/// Used by [`ConflictPolicy::Merge`] and by manual `Merge` resolutions. The
/// engine takes care of IDs and sync metadata on the returned record; only
/// its content matters.
pub trait RecordMerger: Send + Sync {
    /// Combines the local and server versions.
    fn merge(&self, conflict: &Conflict) -> Record;
}

/// Merger that keeps whichever side was written last.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriterWins;

impl RecordMerger for LastWriterWins {
    fn merge(&self, conflict: &Conflict) -> Record {
        conflict.last_writer().clone()
    }
}

/// Outcome of applying one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    /// Local and server agree again.
    Resolved,
    /// Left for a manual decision.
    Deferred,
    /// The local record changed after the conflict was found.
    Stale,
}

pub(crate) struct ConflictResolver {
    policy: ConflictPolicy,
    merger: Arc<dyn RecordMerger>,
    pending: Mutex<Vec<Conflict>>,
}

impl ConflictResolver {
    pub(crate) fn new(policy: ConflictPolicy, merger: Arc<dyn RecordMerger>) -> Self {
        Self {
            policy,
            merger,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn pending(&self) -> Vec<Conflict> {
        self.pending.lock().clone()
    }

    /// Records waiting for a manual decision, with the `updated_at` of the
    /// local version in conflict.
    pub(crate) fn held(&self) -> HashMap<RecordId, DateTime<Utc>> {
        self.pending
            .lock()
            .iter()
            .map(|c| (c.record_id(), c.local.meta().updated_at))
            .collect()
    }

    pub(crate) fn take(&self, record_id: RecordId) -> Option<Conflict> {
        let mut pending = self.pending.lock();
        let index = pending.iter().position(|c| c.record_id() == record_id)?;
        Some(pending.remove(index))
    }

    pub(crate) fn requeue(&self, conflict: Conflict) {
        self.pending.lock().push(conflict);
    }

    pub(crate) fn clear(&self) {
        self.pending.lock().clear();
    }

    /// Resolves the conflicts found by one attempt under the policy.
    ///
    /// Refreshes the manual queue: conflicts deferred here replace earlier
    /// entries for the same record, and earlier entries whose local record
    /// was edited since are dropped. An error that ends the attempt counts
    /// the remaining conflicts as unresolved and leaves the queue untouched.
    pub(crate) async fn resolve_all<R, S>(
        &self,
        conflicts: Vec<Conflict>,
        remote: &R,
        store: &S,
        report: &mut AttemptReport,
    ) -> Result<()>
    where
        R: RemoteApi + ?Sized,
        S: RecordStore + ?Sized,
    {
        let resolution = self.policy.resolution();
        let seen: HashSet<RecordId> = conflicts.iter().map(Conflict::record_id).collect();
        let mut deferred = Vec::new();
        let mut conflicts = conflicts.into_iter();

        while let Some(conflict) = conflicts.next() {
            let entity_type = conflict.entity_type();
            let record_id = conflict.record_id();

            match self.apply(&conflict, resolution, remote, store).await {
                Ok(Settlement::Resolved) => {
                    debug!(%record_id, %resolution, "conflict resolved");
                    report.entry(entity_type).resolved_conflicts += 1;
                }
                Ok(Settlement::Deferred) => {
                    report.entry(entity_type).unresolved_conflicts += 1;
                    deferred.push(conflict);
                }
                Ok(Settlement::Stale) => {
                    debug!(%record_id, "local record changed during sync, conflict left");
                    report.entry(entity_type).unresolved_conflicts += 1;
                }
                Err(e) if e.aborts_attempt() => {
                    report.entry(entity_type).unresolved_conflicts += 1;
                    for rest in conflicts {
                        report.entry(rest.entity_type()).unresolved_conflicts += 1;
                    }
                    return Err(e);
                }
                Err(e) => {
                    warn!(%record_id, %resolution, error = %e, "conflict resolution failed");
                    report.entry(entity_type).unresolved_conflicts += 1;
                }
            }
        }

        let mut queue = Vec::new();
        for held in self.pending() {
            if seen.contains(&held.record_id()) {
                continue;
            }
            if unchanged(store, held.record_id(), held.local.meta().updated_at)? {
                queue.push(held);
            }
        }
        queue.extend(deferred);
        *self.pending.lock() = queue;
        Ok(())
    }

    /// Applies one resolution to one conflict.
    pub(crate) async fn apply<R, S>(
        &self,
        conflict: &Conflict,
        resolution: ConflictResolution,
        remote: &R,
        store: &S,
    ) -> Result<Settlement>
    where
        R: RemoteApi + ?Sized,
        S: RecordStore + ?Sized,
    {
        if resolution == ConflictResolution::Skip {
            return Ok(Settlement::Deferred);
        }

        let record_id = conflict.record_id();
        let observed = conflict.local.meta().updated_at;
        if !unchanged(store, record_id, observed)? {
            return Ok(Settlement::Stale);
        }

        if resolution == ConflictResolution::AcceptRemote {
            let accepted = accept_remote(conflict.remote.clone(), Some(record_id), Utc::now());
            if !store.upsert_if_unchanged(accepted, Some(observed))? {
                return Ok(Settlement::Stale);
            }
            return Ok(Settlement::Resolved);
        }

        let sync_id = conflict
            .remote
            .sync_id()
            .cloned()
            .ok_or_else(|| ProtocolError::invalid("conflicting server record has no sync_id"))?;

        let mut winner = match resolution {
            ConflictResolution::Merge => self.merger.merge(conflict),
            _ => conflict.local.clone(),
        };
        winner.set_id(record_id);
        if winner.is_deleted() {
            winner.make_tombstone();
        }
        {
            let meta = winner.meta_mut();
            meta.sync_id = Some(sync_id.clone());
            meta.synced_at = None;
            meta.updated_at = observed.max(conflict.remote.meta().updated_at);
        }

        remote.update(&sync_id, &winner).await?;

        let updated_at = winner.meta().updated_at;
        if !store.upsert_if_unchanged(winner, Some(observed))? {
            return Ok(Settlement::Stale);
        }
        store.mark_synced(record_id, sync_id, Utc::now(), updated_at)?;
        Ok(Settlement::Resolved)
    }
}

fn unchanged<S>(store: &S, id: RecordId, observed: DateTime<Utc>) -> Result<bool>
where
    S: RecordStore + ?Sized,
{
    Ok(store
        .get(id)?
        .is_some_and(|current| current.meta().updated_at == observed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_core::{Category, CategoryKind, SyncId};

    fn conflict(local_offset_ms: i64) -> Conflict {
        let local = Category::new("o", "Local", CategoryKind::Expense);
        let mut remote = local.clone();
        remote.name = "Remote".into();
        remote.meta.sync_id = Some(SyncId::from("srv-1"));
        remote.meta.updated_at = local.meta.updated_at - Duration::milliseconds(local_offset_ms);
        Conflict::new(local.into(), remote.into())
    }

    fn name(record: &Record) -> &str {
        match record {
            Record::Category(c) => &c.name,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn last_writer_merge_prefers_newer_side() {
        let newer_local = conflict(10);
        assert_eq!(name(&LastWriterWins.merge(&newer_local)), "Local");

        let newer_remote = conflict(-10);
        assert_eq!(name(&LastWriterWins.merge(&newer_remote)), "Remote");
    }

    #[test]
    fn queue_take_and_requeue() {
        let resolver = ConflictResolver::new(ConflictPolicy::Manual, Arc::new(LastWriterWins));
        let c = conflict(0);
        let id = c.record_id();

        let updated_at = c.local.meta().updated_at;
        resolver.requeue(c);
        assert_eq!(resolver.held().get(&id), Some(&updated_at));
        assert_eq!(resolver.pending().len(), 1);

        assert!(resolver.take(RecordId::new()).is_none());
        assert!(resolver.take(id).is_some());
        assert!(resolver.pending().is_empty());
    }
}
