//! Property-based test generators using proptest.

use crate::fixtures::OWNER;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use tally_core::{
    Budget, BudgetPeriod, Category, CategoryKind, Record, SyncId, SyncMeta, Transaction,
    TransactionKind,
};

/// Strategy for timestamps between 2020 and 2030, millisecond precision.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800_000i64..1_893_456_000_000i64).prop_map(|millis| {
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
    })
}

/// Strategy for sync metadata in any state: never uploaded, synced, or
/// edited after sync.
pub fn sync_meta_strategy() -> impl Strategy<Value = SyncMeta> {
    (
        timestamp_strategy(),
        prop::option::of("srv-[a-z0-9]{1,8}"),
        prop::option::of(-5_000i64..5_000i64),
        any::<bool>(),
    )
        .prop_map(|(updated_at, sync_id, synced_offset_ms, is_deleted)| {
            let mut meta = SyncMeta::new(OWNER);
            meta.updated_at = updated_at;
            meta.sync_id = sync_id.map(SyncId::from);
            meta.synced_at = synced_offset_ms.map(|ms| updated_at + Duration::milliseconds(ms));
            meta.is_deleted = is_deleted;
            meta
        })
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,11}").expect("Invalid regex")
}

/// Strategy for new local categories.
pub fn category_strategy() -> impl Strategy<Value = Category> {
    (name_strategy(), any::<bool>()).prop_map(|(name, income)| {
        let kind = if income {
            CategoryKind::Income
        } else {
            CategoryKind::Expense
        };
        Category::new(OWNER, name, kind)
    })
}

/// Strategy for new local transactions.
pub fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        -1_000_000i64..1_000_000i64,
        name_strategy(),
        prop::sample::select(vec![
            TransactionKind::Income,
            TransactionKind::Expense,
            TransactionKind::Transfer,
        ]),
    )
        .prop_map(|(amount_minor, description, kind)| {
            Transaction::new(OWNER, amount_minor, "USD", description, kind)
        })
}

/// Strategy for new local budgets.
pub fn budget_strategy() -> impl Strategy<Value = Budget> {
    (
        name_strategy(),
        1i64..10_000_000i64,
        prop::sample::select(vec![
            BudgetPeriod::Weekly,
            BudgetPeriod::Monthly,
            BudgetPeriod::Yearly,
        ]),
    )
        .prop_map(|(name, limit_minor, period)| {
            let starts_on = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
            Budget::new(OWNER, name, limit_minor, "USD", period, starts_on)
        })
}

/// Strategy for new local records of any type.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop_oneof![
        category_strategy().prop_map(Record::from),
        transaction_strategy().prop_map(Record::from),
        budget_strategy().prop_map(Record::from),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::SyncableRecord;

    proptest! {
        #[test]
        fn generated_records_are_dirty(record in record_strategy()) {
            prop_assert!(record.is_dirty());
            prop_assert!(record.sync_id().is_none());
        }

        #[test]
        fn timestamps_in_range(ts in timestamp_strategy()) {
            prop_assert!(ts.timestamp() >= 1_577_836_800);
            prop_assert!(ts.timestamp() < 1_893_456_000);
        }
    }
}
