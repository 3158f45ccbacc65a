//! Sync metadata and the dirty predicate.

use crate::record::{EntityType, RecordId, SyncId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sync bookkeeping carried by every record.
///
/// The sync engine owns these fields; record content belongs to the
/// application. A record is *dirty* (eligible for upload) when it was never
/// uploaded, never synced, or edited after its last sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// The user the record belongs to.
    pub owner_id: String,
    /// Timestamp of the last local mutation.
    pub updated_at: DateTime<Utc>,
    /// Server identifier, `None` until the server accepted the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<SyncId>,
    /// Timestamp of the last successful sync, `None` if never synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    /// Soft-delete tombstone flag.
    #[serde(default)]
    pub is_deleted: bool,
}

impl SyncMeta {
    /// Creates metadata for a freshly created local record.
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            updated_at: Utc::now(),
            sync_id: None,
            synced_at: None,
            is_deleted: false,
        }
    }

    /// Returns true if the record must be uploaded.
    ///
    /// `sync_id == None || synced_at == None || updated_at > synced_at`
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match (&self.sync_id, self.synced_at) {
            (Some(_), Some(synced_at)) => self.updated_at > synced_at,
            _ => true,
        }
    }

    /// Records a local mutation.
    ///
    /// The new `updated_at` is strictly after `synced_at`, so an edit made in
    /// the same clock tick as the last sync still reads as dirty.
    pub fn touch(&mut self) {
        let mut now = Utc::now();
        if let Some(synced_at) = self.synced_at {
            if now <= synced_at {
                now = synced_at + Duration::milliseconds(1);
            }
        }
        if now <= self.updated_at {
            now = self.updated_at + Duration::milliseconds(1);
        }
        self.updated_at = now;
    }

    /// Records a successful sync.
    ///
    /// `synced_at` is clamped to at least `updated_at` so a server timestamp
    /// slightly ahead of the local clock does not leave the record dirty.
    pub fn mark_synced(&mut self, sync_id: SyncId, synced_at: DateTime<Utc>) {
        self.sync_id = Some(sync_id);
        self.synced_at = Some(synced_at.max(self.updated_at));
    }
}

/// Capability shared by every syncable entity.
///
/// The upload and download passes work through this trait (or through
/// [`crate::Record`], which implements it by delegation) and never inspect
/// concrete entity types.
pub trait SyncableRecord {
    /// Returns the entity type tag.
    fn entity_type(&self) -> EntityType;

    /// Returns the client-generated ID.
    fn id(&self) -> RecordId;

    /// Returns the sync metadata.
    fn meta(&self) -> &SyncMeta;

    /// Returns the sync metadata mutably.
    fn meta_mut(&mut self) -> &mut SyncMeta;

    /// Resets every content-bearing field to its empty value.
    ///
    /// Used when a tombstone arrives so stale content cannot resurface.
    fn clear_content(&mut self);

    /// Returns true if both versions carry the same content.
    ///
    /// Sync metadata other than the tombstone flag is ignored.
    fn same_content(&self, other: &Self) -> bool
    where
        Self: Sized;

    /// Returns true if the record must be uploaded.
    fn is_dirty(&self) -> bool {
        self.meta().is_dirty()
    }

    /// Returns the server identifier, if assigned.
    fn sync_id(&self) -> Option<&SyncId> {
        self.meta().sync_id.as_ref()
    }

    /// Returns true if the record is a tombstone.
    fn is_deleted(&self) -> bool {
        self.meta().is_deleted
    }

    /// Records a local edit.
    fn touch(&mut self) {
        self.meta_mut().touch();
    }

    /// Soft-deletes the record locally.
    fn mark_deleted(&mut self) {
        self.meta_mut().is_deleted = true;
        self.touch();
    }

    /// Turns this version into a content-free tombstone.
    fn make_tombstone(&mut self) {
        self.clear_content();
        self.meta_mut().is_deleted = true;
    }
}
