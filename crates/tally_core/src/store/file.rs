//! File-backed record store.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! └─ records.json      # All records, rewritten atomically on every change
//! ```

use crate::error::{CoreError, CoreResult};
use crate::persist::{lock_exclusive, read_optional, write_atomic};
use crate::record::{EntityType, Record, RecordId, SyncId, SyncableRecord};
use crate::snapshot::StoreSnapshot;
use crate::store::{RecordMap, RecordStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const RECORDS_FILE: &str = "records.json";
const LOCK_FILE: &str = "LOCK";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct FileContentsRef<'a> {
    format_version: u32,
    records: Vec<&'a Record>,
}

#[derive(Deserialize)]
struct FileContents {
    format_version: u32,
    records: Vec<Record>,
}

/// A record store persisted to a JSON file.
///
/// Every mutation is applied to a copy of the in-memory map, written to disk
/// and only then made visible. A failed write leaves both the file and the
/// in-memory view unchanged.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on its directory. Only one
/// `FileRecordStore` can be open per directory at a time.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    records: RwLock<RecordMap>,
    _lock_file: File,
}

impl FileRecordStore {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StoreLocked`] if another process has the store open
    /// - [`CoreError::InvalidFormat`] if the records file has an unknown version
    /// - I/O and decoding errors
    pub fn open(dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(dir)?;
        if !dir.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                dir.display()
            )));
        }

        let lock_file = lock_exclusive(&dir.join(LOCK_FILE))?;
        let path = dir.join(RECORDS_FILE);
        let records = load(&path)?;

        tracing::debug!(path = %path.display(), records = records.len(), "opened record store");

        Ok(Self {
            path,
            records: RwLock::new(records),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the records file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut RecordMap) -> CoreResult<R>) -> CoreResult<R> {
        let mut guard = self.records.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        save(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

fn load(path: &Path) -> CoreResult<RecordMap> {
    let Some(data) = read_optional(path)? else {
        return Ok(RecordMap::default());
    };

    let contents: FileContents = serde_json::from_slice(&data)?;
    if contents.format_version != FORMAT_VERSION {
        return Err(CoreError::invalid_format(format!(
            "unsupported records file version {}",
            contents.format_version
        )));
    }

    Ok(RecordMap::from_records(contents.records))
}

fn save(path: &Path, records: &RecordMap) -> CoreResult<()> {
    let contents = FileContentsRef {
        format_version: FORMAT_VERSION,
        records: records.values().collect(),
    };
    let data = serde_json::to_vec_pretty(&contents)?;
    write_atomic(path, &data)
}

impl RecordStore for FileRecordStore {
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
        self.mutate(|map| {
            map.upsert(record);
            Ok(())
        })
    }

    fn upsert_if_unchanged(
        &self,
        record: Record,
        observed_updated_at: Option<DateTime<Utc>>,
    ) -> CoreResult<bool> {
        let current = self.records.read().get(record.id());
        if current.map(|r| r.meta().updated_at) != observed_updated_at {
            return Ok(false);
        }
        self.mutate(|map| Ok(map.upsert_if_unchanged(record, observed_updated_at)))
    }

    fn mark_synced(
        &self,
        id: RecordId,
        sync_id: SyncId,
        synced_at: DateTime<Utc>,
        observed_updated_at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        self.mutate(|map| map.mark_synced(id, sync_id, synced_at, observed_updated_at))
    }

    fn len(&self) -> CoreResult<usize> {
        Ok(self.records.read().len())
    }

    fn clear(&self) -> CoreResult<()> {
        self.mutate(|map| {
            map.clear();
            Ok(())
        })
    }

    fn snapshot(&self) -> CoreResult<StoreSnapshot> {
        self.records.read().snapshot()
    }

    fn restore(&self, snapshot: &StoreSnapshot) -> CoreResult<()> {
        let records = snapshot.records()?;
        self.mutate(|map| {
            *map = RecordMap::from_records(records);
            Ok(())
        })
    }
}
