//! Point-in-time store snapshots.
//!
//! A snapshot is the canonical JSON encoding of every record in a store,
//! sorted by record ID, together with a SHA-256 digest of those bytes.
//! Two stores holding the same records produce byte-identical snapshots,
//! which is what lets force sync prove a rollback left nothing behind.
//!
//! ## Usage
//!
//! ```
//! use tally_core::{MemoryRecordStore, RecordStore};
//!
//! let store = MemoryRecordStore::new();
//! let snapshot = store.snapshot().unwrap();
//! store.clear().unwrap();
//! store.restore(&snapshot).unwrap();
//! ```

use crate::error::{CoreError, CoreResult};
use crate::record::{Record, SyncableRecord};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A frozen copy of a store's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    data: Vec<u8>,
    digest: String,
    record_count: usize,
    taken_at: DateTime<Utc>,
}

impl StoreSnapshot {
    /// Captures records into a snapshot.
    ///
    /// Records are sorted by ID before encoding; callers may pass them in any
    /// order.
    pub fn capture<'a>(records: impl IntoIterator<Item = &'a Record>) -> CoreResult<Self> {
        let mut records: Vec<&Record> = records.into_iter().collect();
        records.sort_by_key(|record| record.id());

        let data = serde_json::to_vec(&records)?;
        let digest = hex_digest(&data);

        Ok(Self {
            record_count: records.len(),
            data,
            digest,
            taken_at: Utc::now(),
        })
    }

    /// Decodes the records after verifying the digest.
    pub fn records(&self) -> CoreResult<Vec<Record>> {
        self.verify()?;
        let records: Vec<Record> = serde_json::from_slice(&self.data)?;

        if records.len() != self.record_count {
            return Err(CoreError::invalid_format(format!(
                "record count mismatch: expected {}, got {}",
                self.record_count,
                records.len()
            )));
        }

        Ok(records)
    }

    /// Checks that the bytes still match the recorded digest.
    pub fn verify(&self) -> CoreResult<()> {
        let actual = hex_digest(&self.data);
        if actual != self.digest {
            return Err(CoreError::SnapshotChecksumMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Returns the canonical encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the hex SHA-256 digest of the encoded bytes.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Returns the number of records captured.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Returns when the snapshot was taken.
    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        if let Some(byte) = self.data.first_mut() {
            *byte ^= 0xFF;
        }
    }
}

fn hex_digest(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
