//! Watch command implementation.

use super::{build_engine, sync::print_result, Settings};
use std::time::Duration;
use tally_sync_engine::{SyncConfig, SyncStatus};
use tally_sync_protocol::ConflictPolicy;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Syncs immediately, then on the timer, until Ctrl-C.
pub async fn run(
    settings: &Settings,
    interval: Duration,
    policy: ConflictPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::default()
        .with_auto_sync_interval(interval)
        .with_conflict_policy(policy);
    let engine = build_engine(settings, config)?;
    let mut status = engine.subscribe();

    print_result(&engine.perform_auto_sync().await);
    engine.start_auto_sync()?;
    info!(interval_secs = interval.as_secs(), "watching, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = status.recv() => match changed {
                Ok(SyncStatus::Completed | SyncStatus::Failed) => {
                    if let Some(result) = engine.stats().last_result {
                        print_result(&result);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "status updates dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.dispose();
    let stats = engine.stats();
    println!(
        "{} completed, {} failed, {} skipped",
        stats.attempts_completed, stats.attempts_failed, stats.attempts_skipped
    );
    Ok(())
}
