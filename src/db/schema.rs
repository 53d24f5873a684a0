//! Database schema and ledger types

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
///
/// Table and column names stay compatible with the report scripts, which read
/// the same database file.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    description TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at);
";

/// Categories inserted on every startup
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Food",
    "Salary",
    "Needs",
    "Water",
    "Laundry",
    "Transportation",
    "Utilities",
    "Rent",
    "Bills",
];

/// Category used by imports when the category column is blank
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Longest accepted description, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 100;

/// Largest accepted amount (10^15)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Amounts are stored as REAL. A decimal with at most 15 significant digits
/// reads back unchanged through the float's shortest rendering.
const MAX_SIGNIFICANT: i128 = 999_999_999_999_999;

/// Storage format of `created_at`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// All timestamps are recorded at UTC+7
const LOCAL_OFFSET_SECS: i32 = 7 * 60 * 60;

pub type EntryId = i64;

pub fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time at the ledger's fixed offset
pub fn now_local() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&local_offset())
}

/// Format a timestamp for storage (converted to UTC+7 first)
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&local_offset())
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Parse a stored timestamp; values without an offset are UTC+7
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&local_offset()));
    }
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| local_offset().from_local_datetime(&naive).single())
}

/// Parse a strictly positive decimal amount no larger than [`MAX_AMOUNT`]
/// and with at most 15 significant digits
pub fn parse_amount(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim()).ok().filter(|amount| {
        amount.is_sign_positive()
            && !amount.is_zero()
            && *amount <= MAX_AMOUNT
            && amount.normalize().mantissa() <= MAX_SIGNIFICANT
    })
}

// ============================================================================
// Entry Kind
// ============================================================================

/// Income/expense discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub const ALL: [EntryKind; 2] = [EntryKind::Income, EntryKind::Expense];

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    /// Button label
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Income => "Income",
            EntryKind::Expense => "Expense",
        }
    }

    /// Lenient parse: surrounding whitespace and case are ignored
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(EntryKind::Income),
            "expense" => Some(EntryKind::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Ledger Entries
// ============================================================================

/// A persisted income or expense record
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl LedgerEntry {
    /// Multi-line summary shown before editing or deleting
    pub fn details(&self) -> String {
        format!(
            "Transaction ID: {}\nType: {}\nCategory: {}\nAmount: {:.2}\nDescription: {}",
            self.id,
            self.kind,
            self.category,
            self.amount,
            self.description.as_deref().unwrap_or(""),
        )
    }
}

/// An entry that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

/// Editable fields of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Kind,
    Category,
    Amount,
    Description,
}

impl EditField {
    pub const ALL: [EditField; 4] = [
        EditField::Kind,
        EditField::Category,
        EditField::Amount,
        EditField::Description,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EditField::Kind => "type",
            EditField::Category => "category",
            EditField::Amount => "amount",
            EditField::Description => "description",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            EditField::Kind => "Edit Type",
            EditField::Category => "Edit Category",
            EditField::Amount => "Edit Amount",
            EditField::Description => "Edit Description",
        }
    }
}

/// A single-field update
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Kind(EntryKind),
    Category(String),
    Amount(Decimal),
    /// `None` clears the description
    Description(Option<String>),
}

impl FieldChange {
    pub fn field(&self) -> EditField {
        match self {
            FieldChange::Kind(_) => EditField::Kind,
            FieldChange::Category(_) => EditField::Category,
            FieldChange::Amount(_) => EditField::Amount,
            FieldChange::Description(_) => EditField::Description,
        }
    }

    /// Human-readable result, e.g. "amount set to 12.50"
    pub fn describe(&self) -> String {
        match self {
            FieldChange::Kind(kind) => format!("type set to {kind}"),
            FieldChange::Category(name) => format!("category set to {name}"),
            FieldChange::Amount(amount) => format!("amount set to {amount:.2}"),
            FieldChange::Description(Some(_)) => "description set.".to_string(),
            FieldChange::Description(None) => "description cleared.".to_string(),
        }
    }
}

/// Sums of amounts per kind over a time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindTotals {
    pub income: Decimal,
    pub expense: Decimal,
}

impl KindTotals {
    pub fn balance(&self) -> Decimal {
        self.income - self.expense
    }
}
