//! Syncable records.
//!
//! Every entity the tracker stores is a [`Record`]: a tagged union of
//! [`Transaction`], [`Category`] and [`Budget`]. All three share the
//! [`SyncableRecord`] capability, which exposes the sync metadata the engine
//! needs without knowing the concrete type.

mod id;
mod kinds;
mod meta;

pub use id::{RecordId, SyncId};
pub use kinds::{Budget, BudgetPeriod, Category, CategoryKind, Transaction, TransactionKind};
pub use meta::{SyncMeta, SyncableRecord};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A money movement.
    Transaction,
    /// A transaction grouping.
    Category,
    /// A spending limit.
    Budget,
}

impl EntityType {
    /// Every entity type, in upload order.
    ///
    /// Categories go first so transactions and budgets referencing them
    /// reach the server after their parent. Nothing depends on this order.
    pub const ALL: [EntityType; 3] = [
        EntityType::Category,
        EntityType::Budget,
        EntityType::Transaction,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Transaction => "transaction",
            EntityType::Category => "category",
            EntityType::Budget => "budget",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transaction" => Ok(EntityType::Transaction),
            "category" => Ok(EntityType::Category),
            "budget" => Ok(EntityType::Budget),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// A syncable entity of any type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum Record {
    /// A transaction.
    Transaction(Transaction),
    /// A category.
    Category(Category),
    /// A budget.
    Budget(Budget),
}

impl Record {
    /// Returns a copy of this record turned into a tombstone.
    #[must_use]
    pub fn tombstoned(mut self) -> Self {
        self.make_tombstone();
        self
    }

    /// Replaces the client ID.
    ///
    /// Used when a server record matched a local one by `sync_id` but carries
    /// a different client ID; the local key is kept.
    pub fn set_id(&mut self, id: RecordId) {
        match self {
            Record::Transaction(r) => r.id = id,
            Record::Category(r) => r.id = id,
            Record::Budget(r) => r.id = id,
        }
    }
}

impl SyncableRecord for Record {
    fn entity_type(&self) -> EntityType {
        match self {
            Record::Transaction(r) => r.entity_type(),
            Record::Category(r) => r.entity_type(),
            Record::Budget(r) => r.entity_type(),
        }
    }

    fn id(&self) -> RecordId {
        match self {
            Record::Transaction(r) => r.id,
            Record::Category(r) => r.id,
            Record::Budget(r) => r.id,
        }
    }

    fn meta(&self) -> &SyncMeta {
        match self {
            Record::Transaction(r) => &r.meta,
            Record::Category(r) => &r.meta,
            Record::Budget(r) => &r.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        match self {
            Record::Transaction(r) => &mut r.meta,
            Record::Category(r) => &mut r.meta,
            Record::Budget(r) => &mut r.meta,
        }
    }

    fn clear_content(&mut self) {
        match self {
            Record::Transaction(r) => r.clear_content(),
            Record::Category(r) => r.clear_content(),
            Record::Budget(r) => r.clear_content(),
        }
    }

    fn same_content(&self, other: &Self) -> bool {
        match (self, other) {
            (Record::Transaction(a), Record::Transaction(b)) => a.same_content(b),
            (Record::Category(a), Record::Category(b)) => a.same_content(b),
            (Record::Budget(a), Record::Budget(b)) => a.same_content(b),
            _ => false,
        }
    }
}

impl From<Transaction> for Record {
    fn from(value: Transaction) -> Self {
        Record::Transaction(value)
    }
}

impl From<Category> for Record {
    fn from(value: Category) -> Self {
        Record::Category(value)
    }
}

impl From<Budget> for Record {
    fn from(value: Budget) -> Self {
        Record::Budget(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn wire_shape_is_tagged_and_flat() {
        let txn = Transaction::new("owner-1", -499, "USD", "Lunch", TransactionKind::Expense);
        let id = txn.id;
        let record = Record::from(txn);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["entity_type"], "transaction");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["owner_id"], "owner-1");
        assert_eq!(json["amount_minor"], -499);
        assert!(json["updated_at"].as_str().unwrap().contains('T'));

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn decodes_server_tombstone() {
        let json = serde_json::json!({
            "entity_type": "category",
            "id": RecordId::new().to_string(),
            "owner_id": "owner-1",
            "updated_at": "2026-03-01T10:00:00Z",
            "sync_id": "srv-7",
            "is_deleted": true,
            "name": "Old name",
            "kind": "expense"
        });

        let record: Record = serde_json::from_value(json).unwrap();
        assert!(record.is_deleted());
        assert_eq!(record.sync_id(), Some(&SyncId::from("srv-7")));
        assert_eq!(record.entity_type(), EntityType::Category);
    }

    #[test]
    fn different_variants_never_share_content() {
        let cat = Record::from(Category::new("o", "x", CategoryKind::Expense));
        let txn = Record::from(Transaction::new("o", 1, "EUR", "x", TransactionKind::Income));
        assert!(!cat.same_content(&txn));
    }

    #[test]
    fn tombstoned_clears_content() {
        let mut cat = Category::new("o", "Rent", CategoryKind::Expense).with_color("#ff0000");
        cat.meta.mark_synced(SyncId::from("srv-1"), Utc::now());
        let record = Record::from(cat).tombstoned();

        match &record {
            Record::Category(c) => {
                assert!(c.name.is_empty());
                assert!(c.color.is_none());
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert!(record.is_deleted());
    }

    #[test]
    fn entity_type_parse() {
        for ty in EntityType::ALL {
            assert_eq!(ty.as_str().parse::<EntityType>().unwrap(), ty);
        }
        assert!("invoice".parse::<EntityType>().is_err());
    }
}
