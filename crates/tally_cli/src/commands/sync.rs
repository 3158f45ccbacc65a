//! Sync command implementation.

use super::{build_engine, Settings};
use tally_core::EntityType;
use tally_sync_engine::{SyncConfig, SyncResult};
use tally_sync_protocol::ConflictPolicy;

/// Runs one sync attempt and prints its outcome.
pub async fn run(
    settings: &Settings,
    full: bool,
    force: bool,
    policy: ConflictPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::default()
        .without_auto_sync_interval()
        .with_conflict_policy(policy);
    let engine = build_engine(settings, config)?;

    let result = if force {
        engine.perform_force_sync().await
    } else if full {
        engine.perform_full_sync().await
    } else {
        engine.perform_incremental_sync().await
    };
    print_result(&result);

    // The manual queue lives in memory; list what this run left undecided.
    for conflict in engine.pending_conflicts() {
        println!(
            "conflict: {} {} (kept local version, not uploaded)",
            conflict.entity_type(),
            conflict.record_id()
        );
    }
    engine.dispose();

    match result.error() {
        Some(error) => Err(format!("Sync failed: {error}").into()),
        None => Ok(()),
    }
}

/// Prints per-type counts of an attempt.
pub fn print_result(result: &SyncResult) {
    println!(
        "{} sync {} in {} ms",
        result.kind(),
        result.status(),
        result.duration().as_millis()
    );
    println!(
        "{:<12} {:>8} {:>10} {:>8} {:>8}",
        "Type", "Uploaded", "Downloaded", "Failed", "Conflicts"
    );
    for entity_type in EntityType::ALL {
        let counts = result.counts(entity_type);
        println!(
            "{:<12} {:>8} {:>10} {:>8} {:>8}",
            entity_type.as_str(),
            counts.uploaded,
            counts.downloaded,
            counts.upload_failed + counts.download_failed,
            counts.resolved_conflicts + counts.unresolved_conflicts
        );
    }
}
