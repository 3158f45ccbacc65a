//! List command implementation.

use super::{data_dir_exists, format_amount, open_store, Settings};
use tally_core::{EntityType, Record, RecordStore, SyncableRecord};

/// Runs the list command.
pub fn run(
    settings: &Settings,
    entity_type: Option<EntityType>,
    include_deleted: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !data_dir_exists(&settings.data_dir) {
        return Err(format!("No local data at {:?}", settings.data_dir).into());
    }
    let store = open_store(settings)?;

    let types = match entity_type {
        Some(ty) => vec![ty],
        None => EntityType::ALL.to_vec(),
    };
    let mut records = Vec::new();
    for ty in types {
        records.extend(
            store
                .list(ty)?
                .into_iter()
                .filter(|r| include_deleted || !r.is_deleted()),
        );
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => {
            for record in &records {
                println!("{}", summarize(record));
            }
            println!("{} record(s)", records.len());
        }
    }

    Ok(())
}

fn summarize(record: &Record) -> String {
    let flags = match (record.is_deleted(), record.is_dirty()) {
        (true, true) => "D*",
        (true, false) => "D ",
        (false, true) => " *",
        (false, false) => "  ",
    };
    let detail = match record {
        Record::Transaction(txn) => format!(
            "{} {} {} ({})",
            txn.occurred_at.format("%Y-%m-%d"),
            format_amount(txn.amount_minor),
            txn.currency,
            txn.description
        ),
        Record::Category(category) => format!("{} [{:?}]", category.name, category.kind),
        Record::Budget(budget) => format!(
            "{} {} {} per {:?}",
            budget.name,
            format_amount(budget.limit_minor),
            budget.currency,
            budget.period
        ),
    };
    format!(
        "{flags} {} {:<11} {detail}",
        record.id(),
        record.entity_type().as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Category, CategoryKind};

    #[test]
    fn summary_marks_pending_upload() {
        let record: Record = Category::new("me", "Rent", CategoryKind::Expense).into();
        let line = summarize(&record);
        assert!(line.starts_with(" *"));
        assert!(line.contains("category"));
        assert!(line.contains("Rent [Expense]"));
    }
}
