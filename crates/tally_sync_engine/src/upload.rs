//! Upload pass: push locally dirty records.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{Result, SyncError};
use crate::remote::RemoteApi;
use crate::result::AttemptReport;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tally_core::{EntityType, Record, RecordId, RecordStore, SyncableRecord};
use tracing::{debug, warn};

/// Pushes every dirty record except those held for a manual decision.
///
/// `held` maps a client ID to the `updated_at` of the version in conflict;
/// a record edited since is uploaded again. Records without a `sync_id` are
/// created, the others are updated by `sync_id`. Every version the server
/// accepted is added to `pushed`.
///
/// A per-record failure leaves the record dirty and the pass continues.
/// Errors that end the attempt (lost connectivity, rejected credentials,
/// store failures) stop the pass immediately.
pub(crate) async fn upload_pass<R, S>(
    remote: &R,
    store: &S,
    connectivity: &dyn ConnectivityMonitor,
    held: &HashMap<RecordId, DateTime<Utc>>,
    pushed: &mut HashMap<RecordId, Record>,
    report: &mut AttemptReport,
) -> Result<()>
where
    R: RemoteApi + ?Sized,
    S: RecordStore + ?Sized,
{
    for entity_type in EntityType::ALL {
        let dirty = store.dirty(entity_type)?;
        if dirty.is_empty() {
            continue;
        }
        debug!(%entity_type, count = dirty.len(), "uploading dirty records");

        for record in dirty {
            if held.get(&record.id()) == Some(&record.meta().updated_at) {
                debug!(record_id = %record.id(), "awaiting manual resolution, not uploaded");
                continue;
            }
            if !connectivity.is_online() {
                return Err(SyncError::NotConnected);
            }

            match upload_record(remote, store, &record).await {
                Ok(()) => {
                    report.entry(entity_type).uploaded += 1;
                    pushed.insert(record.id(), record);
                }
                Err(e) if e.aborts_attempt() => return Err(e),
                Err(e) => {
                    warn!(record_id = %record.id(), %entity_type, error = %e, "upload failed");
                    report.entry(entity_type).upload_failed += 1;
                }
            }
        }
    }

    Ok(())
}

async fn upload_record<R, S>(remote: &R, store: &S, record: &Record) -> Result<()>
where
    R: RemoteApi + ?Sized,
    S: RecordStore + ?Sized,
{
    let observed = record.meta().updated_at;

    let sync_id = match record.sync_id() {
        Some(sync_id) => {
            remote.update(sync_id, record).await?;
            sync_id.clone()
        }
        None => remote.create(record).await?,
    };

    if !store.mark_synced(record.id(), sync_id, Utc::now(), observed)? {
        debug!(record_id = %record.id(), "edited during upload, left dirty");
    }
    Ok(())
}
