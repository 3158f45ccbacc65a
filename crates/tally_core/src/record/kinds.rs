//! Concrete finance entities.

use crate::record::{EntityType, RecordId, SyncMeta, SyncableRecord};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money coming in.
    Income,
    /// Money going out.
    #[default]
    Expense,
    /// Movement between the user's own accounts.
    Transfer,
}

/// Which side of the books a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Income category.
    Income,
    /// Expense category.
    #[default]
    Expense,
}

/// Length of a budget window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    /// Seven days.
    Weekly,
    /// One calendar month.
    #[default]
    Monthly,
    /// One calendar year.
    Yearly,
}

/// A single money movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Client-generated ID.
    pub id: RecordId,
    /// Sync metadata.
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Amount in minor currency units (cents).
    pub amount_minor: i64,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Free-form description.
    pub description: String,
    /// Category the transaction is filed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<RecordId>,
    /// When the money moved.
    pub occurred_at: DateTime<Utc>,
    /// Direction of the movement.
    pub kind: TransactionKind,
    /// Optional user note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Transaction {
    /// Creates a new local transaction that occurred now.
    pub fn new(
        owner_id: impl Into<String>,
        amount_minor: i64,
        currency: impl Into<String>,
        description: impl Into<String>,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: RecordId::new(),
            meta: SyncMeta::new(owner_id),
            amount_minor,
            currency: currency.into(),
            description: description.into(),
            category_id: None,
            occurred_at: Utc::now(),
            kind,
            note: None,
        }
    }

    /// Files the transaction under a category.
    #[must_use]
    pub fn with_category(mut self, category_id: RecordId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Sets when the transaction occurred.
    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Attaches a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl SyncableRecord for Transaction {
    fn entity_type(&self) -> EntityType {
        EntityType::Transaction
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn clear_content(&mut self) {
        self.amount_minor = 0;
        self.description.clear();
        self.category_id = None;
        self.note = None;
    }

    fn same_content(&self, other: &Self) -> bool {
        self.meta.is_deleted == other.meta.is_deleted
            && self.amount_minor == other.amount_minor
            && self.currency == other.currency
            && self.description == other.description
            && self.category_id == other.category_id
            && self.occurred_at == other.occurred_at
            && self.kind == other.kind
            && self.note == other.note
    }
}

/// A grouping for transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Client-generated ID.
    pub id: RecordId,
    /// Sync metadata.
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Display name.
    pub name: String,
    /// Income or expense.
    pub kind: CategoryKind,
    /// Display color (`#rrggbb`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Icon name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Parent category for nesting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RecordId>,
}

impl Category {
    /// Creates a new local category.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            id: RecordId::new(),
            meta: SyncMeta::new(owner_id),
            name: name.into(),
            kind,
            color: None,
            icon: None,
            parent_id: None,
        }
    }

    /// Sets the display color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Nests the category under a parent.
    #[must_use]
    pub fn with_parent(mut self, parent_id: RecordId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl SyncableRecord for Category {
    fn entity_type(&self) -> EntityType {
        EntityType::Category
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn clear_content(&mut self) {
        self.name.clear();
        self.color = None;
        self.icon = None;
        self.parent_id = None;
    }

    fn same_content(&self, other: &Self) -> bool {
        self.meta.is_deleted == other.meta.is_deleted
            && self.name == other.name
            && self.kind == other.kind
            && self.color == other.color
            && self.icon == other.icon
            && self.parent_id == other.parent_id
    }
}

/// A spending limit over a recurring window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Client-generated ID.
    pub id: RecordId,
    /// Sync metadata.
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Display name.
    pub name: String,
    /// Category the limit applies to; `None` means all spending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<RecordId>,
    /// Limit in minor currency units.
    pub limit_minor: i64,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Window length.
    pub period: BudgetPeriod,
    /// First day of the first window.
    pub starts_on: NaiveDate,
    /// Whether unspent amounts carry into the next window.
    #[serde(default)]
    pub rollover: bool,
}

impl Budget {
    /// Creates a new local budget.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        limit_minor: i64,
        currency: impl Into<String>,
        period: BudgetPeriod,
        starts_on: NaiveDate,
    ) -> Self {
        Self {
            id: RecordId::new(),
            meta: SyncMeta::new(owner_id),
            name: name.into(),
            category_id: None,
            limit_minor,
            currency: currency.into(),
            period,
            starts_on,
            rollover: false,
        }
    }

    /// Restricts the budget to one category.
    #[must_use]
    pub fn with_category(mut self, category_id: RecordId) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl SyncableRecord for Budget {
    fn entity_type(&self) -> EntityType {
        EntityType::Budget
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn clear_content(&mut self) {
        self.name.clear();
        self.category_id = None;
        self.limit_minor = 0;
        self.rollover = false;
    }

    fn same_content(&self, other: &Self) -> bool {
        self.meta.is_deleted == other.meta.is_deleted
            && self.name == other.name
            && self.category_id == other.category_id
            && self.limit_minor == other.limit_minor
            && self.currency == other.currency
            && self.period == other.period
            && self.starts_on == other.starts_on
            && self.rollover == other.rollover
    }
}
