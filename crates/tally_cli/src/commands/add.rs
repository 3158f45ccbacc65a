//! Commands creating local records.

use super::{open_store, parse_amount, CategoryKindArg, Settings, TransactionKindArg};
use tally_core::{Category, Record, RecordId, RecordStore, SyncableRecord, Transaction};

/// Creates a category and prints its ID.
pub fn category(
    settings: &Settings,
    name: &str,
    kind: CategoryKindArg,
    color: Option<String>,
) -> Result<RecordId, Box<dyn std::error::Error>> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Category name must not be empty".into());
    }

    let mut category = Category::new(&settings.owner, name, kind.into());
    if let Some(color) = color {
        category = category.with_color(color);
    }
    save(settings, category.into())
}

/// Creates a transaction and prints its ID.
pub fn transaction(
    settings: &Settings,
    amount: &str,
    description: &str,
    currency: &str,
    kind: TransactionKindArg,
    category_id: Option<&str>,
) -> Result<RecordId, Box<dyn std::error::Error>> {
    let amount_minor = parse_amount(amount)?;
    let currency = currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("Invalid currency code: {currency}").into());
    }

    let mut txn = Transaction::new(
        &settings.owner,
        amount_minor,
        currency,
        description,
        kind.into(),
    );
    if let Some(category_id) = category_id {
        let category_id: RecordId = category_id.parse()?;
        let store = open_store(settings)?;
        match store.get(category_id)? {
            Some(Record::Category(category)) if !category.meta.is_deleted => {}
            _ => return Err(format!("No category {category_id}").into()),
        }
        drop(store);
        txn = txn.with_category(category_id);
    }
    save(settings, txn.into())
}

fn save(settings: &Settings, record: Record) -> Result<RecordId, Box<dyn std::error::Error>> {
    let store = open_store(settings)?;
    let id = record.id();
    let entity_type = record.entity_type();
    store.upsert(record)?;

    tracing::debug!(%id, %entity_type, "record created");
    println!("{id}");
    Ok(id)
}
