//! Delete command implementation.

use super::{open_store, Settings};
use tally_core::{RecordId, RecordStore, SyncableRecord};

/// Tombstones a record. The deletion is uploaded by the next sync.
pub fn run(settings: &Settings, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: RecordId = id.parse()?;
    let store = open_store(settings)?;

    let mut record = store.get(id)?.ok_or_else(|| format!("No record {id}"))?;
    if record.is_deleted() {
        println!("{id} is already deleted");
        return Ok(());
    }

    record.mark_deleted();
    store.upsert(record)?;
    println!("Deleted {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add;
    use crate::commands::CategoryKindArg;
    use tempfile::TempDir;

    #[test]
    fn delete_leaves_dirty_tombstone() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            server: None,
            token: None,
            owner: "me".into(),
        };
        let id = add::category(&settings, "Old", CategoryKindArg::Expense, None).unwrap();

        run(&settings, &id.to_string()).unwrap();
        run(&settings, &id.to_string()).unwrap();

        let record = open_store(&settings).unwrap().get(id).unwrap().unwrap();
        assert!(record.is_deleted());
        assert!(record.is_dirty());
        assert!(run(&settings, "not-an-id").is_err());
    }
}
