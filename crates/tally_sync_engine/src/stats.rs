//! Cumulative engine statistics.

use crate::result::SyncResult;

/// Statistics about sync attempts since the engine was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Attempts that completed.
    pub attempts_completed: u64,
    /// Attempts that failed.
    pub attempts_failed: u64,
    /// Requests dropped by the single-flight guard.
    pub attempts_skipped: u64,
    /// Total records uploaded.
    pub records_uploaded: u64,
    /// Total server records applied locally.
    pub records_downloaded: u64,
    /// Total conflicts resolved.
    pub conflicts_resolved: u64,
    /// Total conflicts left unresolved.
    pub conflicts_unresolved: u64,
    /// Outcome of the last admitted attempt.
    pub last_result: Option<SyncResult>,
    /// Error of the last failed attempt.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record(&mut self, result: &SyncResult) {
        if result.is_skipped() {
            self.attempts_skipped += 1;
            return;
        }

        let totals = result.totals();
        self.records_uploaded += totals.uploaded;
        self.records_downloaded += totals.downloaded;
        self.conflicts_resolved += totals.resolved_conflicts;
        self.conflicts_unresolved += totals.unresolved_conflicts;

        if result.is_success() {
            self.attempts_completed += 1;
        } else {
            self.attempts_failed += 1;
            self.last_error = result.error().map(str::to_owned);
        }
        self.last_result = Some(result.clone());
    }
}
