//! Per-attempt sync outcomes.

use crate::status::SyncStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tally_core::EntityType;

/// Kind of sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Upload, then download the complete remote set.
    Full,
    /// Upload, then download changes since the ledger boundary.
    Incremental,
    /// Replace the local store with the remote set.
    Force,
}

impl SyncKind {
    /// Returns true if the attempt downloads the complete remote set.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, SyncKind::Full | SyncKind::Force)
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncKind::Full => "full",
            SyncKind::Incremental => "incremental",
            SyncKind::Force => "force",
        })
    }
}

/// Counters for one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    /// Records pushed to the server.
    pub uploaded: u64,
    /// Server records written locally.
    pub downloaded: u64,
    /// Records whose upload failed.
    pub upload_failed: u64,
    /// Server records that could not be applied.
    pub download_failed: u64,
    /// Conflicts settled in this attempt.
    pub resolved_conflicts: u64,
    /// Conflicts left for a later attempt or manual resolution.
    pub unresolved_conflicts: u64,
}

impl EntityCounts {
    fn add(&mut self, other: &EntityCounts) {
        self.uploaded += other.uploaded;
        self.downloaded += other.downloaded;
        self.upload_failed += other.upload_failed;
        self.download_failed += other.download_failed;
        self.resolved_conflicts += other.resolved_conflicts;
        self.unresolved_conflicts += other.unresolved_conflicts;
    }
}

/// Immutable outcome of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    kind: SyncKind,
    status: SyncStatus,
    skipped: bool,
    error: Option<String>,
    counts: BTreeMap<EntityType, EntityCounts>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl SyncResult {
    /// Result for a request dropped because another attempt was running.
    pub(crate) fn skipped(kind: SyncKind) -> Self {
        let now = Utc::now();
        Self {
            kind,
            status: SyncStatus::Syncing,
            skipped: true,
            error: None,
            counts: BTreeMap::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Returns the attempt kind.
    #[must_use]
    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    /// Returns the terminal status, or `Syncing` for a skipped request.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Returns true if the request was dropped by the single-flight guard.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Returns true if the attempt completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Completed
    }

    /// Returns the error that failed the attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the counters for one entity type.
    #[must_use]
    pub fn counts(&self, entity_type: EntityType) -> EntityCounts {
        self.counts.get(&entity_type).copied().unwrap_or_default()
    }

    /// Returns the counters summed over all entity types.
    #[must_use]
    pub fn totals(&self) -> EntityCounts {
        let mut totals = EntityCounts::default();
        for counts in self.counts.values() {
            totals.add(counts);
        }
        totals
    }

    /// Returns when the attempt started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the attempt finished.
    #[must_use]
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Returns the attempt duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "{} sync skipped: another sync is in progress", self.kind);
        }

        let t = self.totals();
        write!(
            f,
            "{} sync {}: {} uploaded, {} downloaded, {} failed, {} conflicts resolved, {} unresolved",
            self.kind,
            self.status,
            t.uploaded,
            t.downloaded,
            t.upload_failed + t.download_failed,
            t.resolved_conflicts,
            t.unresolved_conflicts
        )?;
        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// Mutable accumulator for an attempt in flight.
#[derive(Debug)]
pub(crate) struct AttemptReport {
    kind: SyncKind,
    started_at: DateTime<Utc>,
    counts: BTreeMap<EntityType, EntityCounts>,
}

impl AttemptReport {
    pub(crate) fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            started_at: Utc::now(),
            counts: BTreeMap::new(),
        }
    }

    pub(crate) fn kind(&self) -> SyncKind {
        self.kind
    }

    pub(crate) fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn entry(&mut self, entity_type: EntityType) -> &mut EntityCounts {
        self.counts.entry(entity_type).or_default()
    }

    pub(crate) fn download_failures(&self) -> u64 {
        self.counts.values().map(|c| c.download_failed).sum()
    }

    /// Clears download and conflict counters when nothing was installed.
    pub(crate) fn discard_downloads(&mut self) {
        for counts in self.counts.values_mut() {
            counts.downloaded = 0;
            counts.resolved_conflicts = 0;
            counts.unresolved_conflicts = 0;
        }
    }

    pub(crate) fn finish(self, status: SyncStatus, error: Option<String>) -> SyncResult {
        SyncResult {
            kind: self.kind,
            status,
            skipped: false,
            error,
            counts: self.counts,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_entity_types() {
        let mut report = AttemptReport::new(SyncKind::Full);
        report.entry(EntityType::Category).uploaded = 2;
        report.entry(EntityType::Transaction).uploaded = 3;
        report.entry(EntityType::Transaction).upload_failed = 1;

        let result = report.finish(SyncStatus::Completed, None);
        assert!(result.is_success());
        assert_eq!(result.totals().uploaded, 5);
        assert_eq!(result.counts(EntityType::Transaction).upload_failed, 1);
        assert_eq!(result.counts(EntityType::Budget), EntityCounts::default());
    }

    #[test]
    fn skipped_result() {
        let result = SyncResult::skipped(SyncKind::Incremental);
        assert!(result.is_skipped());
        assert!(!result.is_success());
        assert_eq!(result.totals(), EntityCounts::default());
        assert!(result.to_string().contains("skipped"));
    }

    #[test]
    fn failed_result_carries_error() {
        let report = AttemptReport::new(SyncKind::Force);
        let result = report.finish(SyncStatus::Failed, Some("not connected to server".into()));

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("not connected to server"));
        assert!(result.to_string().contains("force sync failed"));
    }

    #[test]
    fn discard_downloads_keeps_uploads() {
        let mut report = AttemptReport::new(SyncKind::Force);
        report.entry(EntityType::Budget).uploaded = 1;
        report.entry(EntityType::Budget).downloaded = 4;
        report.discard_downloads();

        let result = report.finish(SyncStatus::Failed, None);
        assert_eq!(result.counts(EntityType::Budget).uploaded, 1);
        assert_eq!(result.counts(EntityType::Budget).downloaded, 0);
    }
}
