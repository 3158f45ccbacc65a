//! Status command implementation.

use super::{data_dir_exists, ledger_store, open_store, Settings};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{EntityType, RecordStore, SyncableRecord};
use tally_sync_engine::LedgerStore;

/// Local sync status.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Data directory.
    pub data_dir: String,
    /// Start of the last completed full sync.
    pub last_full_sync_at: Option<DateTime<Utc>>,
    /// Start of the last completed sync of any kind.
    pub last_incremental_sync_at: Option<DateTime<Utc>>,
    /// Per-type record counts.
    pub entities: Vec<EntityStatus>,
}

/// Record counts for one entity type.
#[derive(Debug, Serialize)]
pub struct EntityStatus {
    /// Entity type.
    pub entity_type: EntityType,
    /// Live records.
    pub live: usize,
    /// Tombstones.
    pub deleted: usize,
    /// Records waiting for upload.
    pub pending_upload: usize,
}

/// Runs the status command.
pub fn run(settings: &Settings, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !data_dir_exists(&settings.data_dir) {
        return Err(format!("No local data at {:?}", settings.data_dir).into());
    }

    let store = open_store(settings)?;
    let ledger = ledger_store(settings).load()?;

    let mut entities = Vec::new();
    for entity_type in EntityType::ALL {
        let records = store.list(entity_type)?;
        let deleted = records.iter().filter(|r| r.is_deleted()).count();
        entities.push(EntityStatus {
            entity_type,
            live: records.len() - deleted,
            deleted,
            pending_upload: store.dirty(entity_type)?.len(),
        });
    }

    let report = StatusReport {
        data_dir: settings.data_dir.display().to_string(),
        last_full_sync_at: ledger.last_full_sync_at,
        last_incremental_sync_at: ledger.last_incremental_sync_at,
        entities,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }

    Ok(())
}

fn print_text_output(report: &StatusReport) {
    let never = || "never".to_string();
    println!("Tally Status");
    println!("============");
    println!("Data directory:   {}", report.data_dir);
    println!(
        "Last full sync:   {}",
        report.last_full_sync_at.map_or_else(never, |t| t.to_rfc3339())
    );
    println!(
        "Last sync:        {}",
        report
            .last_incremental_sync_at
            .map_or_else(never, |t| t.to_rfc3339())
    );
    println!();
    println!("{:<12} {:>8} {:>8} {:>8}", "Type", "Live", "Deleted", "Pending");
    for entity in &report.entities {
        println!(
            "{:<12} {:>8} {:>8} {:>8}",
            entity.entity_type.as_str(),
            entity.live,
            entity.deleted,
            entity.pending_upload
        );
    }
}
