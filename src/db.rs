//! Database module for the ledger
//!
//! Provides persistence for categories and ledger entries.

mod schema;

pub use schema::*;

use chrono::{DateTime, FixedOffset};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Transaction not found: {0}")]
    EntryNotFound(EntryId),
    #[error("Amount cannot be stored: {0}")]
    InvalidAmount(String),
    #[error("Amount total overflowed")]
    AmountOverflow,
}

pub type DbResult<T> = Result<T, DbError>;

const ENTRY_COLUMNS: &str = "id, type, category, amount, description, created_at";

const INSERT_ENTRY: &str =
    "INSERT INTO transactions (type, category, amount, description, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// The connection is only ever used from the single dispatch path, so a
    /// poisoned lock still guards a consistent connection.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }

    // ==================== Category Operations ====================

    /// Insert the given categories if absent, in one transaction
    pub fn seed_categories(&self, names: &[&str]) -> DbResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for name in names {
            ensure_category(&tx, name)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Create a category unless one with the same name (ignoring case)
    /// exists. Returns the canonical spelling.
    #[allow(dead_code)] // Store API; imports create categories inside their batch
    pub fn create_category(&self, name: &str) -> DbResult<String> {
        let conn = self.conn();
        Ok(ensure_category(&conn, name)?)
    }

    /// Look up the canonical spelling of a category, ignoring case
    #[allow(dead_code)] // Store API; dialogs resolve against the cached list
    pub fn resolve_category(&self, name: &str) -> DbResult<Option<String>> {
        let conn = self.conn();
        Ok(find_category(&conn, name)?)
    }

    /// All category names, alphabetically
    pub fn list_categories(&self) -> DbResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY name COLLATE NOCASE")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Entry Operations ====================

    /// Insert a ledger entry, returning its id
    pub fn insert_entry(&self, entry: &NewEntry) -> DbResult<EntryId> {
        let conn = self.conn();
        conn.execute(
            INSERT_ENTRY,
            params![
                entry.kind.as_str(),
                entry.category,
                amount_to_sql(entry.amount)?,
                entry.description,
                format_timestamp(&entry.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get entry by ID
    pub fn get_entry(&self, id: EntryId) -> DbResult<LedgerEntry> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM transactions WHERE id = ?1"
        ))?;

        stmt.query_row(params![id], parse_entry_row)
            .optional()?
            .ok_or(DbError::EntryNotFound(id))
    }

    /// Update a single field of an entry
    pub fn update_entry(&self, id: EntryId, change: &FieldChange) -> DbResult<()> {
        let value = match change {
            FieldChange::Kind(kind) => Value::Text(kind.as_str().to_string()),
            FieldChange::Category(name) => Value::Text(name.clone()),
            FieldChange::Description(text) => text.clone().map_or(Value::Null, Value::Text),
            FieldChange::Amount(amount) => Value::Real(amount_to_sql(*amount)?),
        };

        // Column names are a closed set; see EditField::as_str
        let sql = format!(
            "UPDATE transactions SET {} = ?1 WHERE id = ?2",
            change.field().as_str()
        );

        let updated = self.conn().execute(&sql, params![value, id])?;
        if updated == 0 {
            return Err(DbError::EntryNotFound(id));
        }
        Ok(())
    }

    /// Delete an entry. Returns whether a row was actually removed.
    pub fn delete_entry(&self, id: EntryId) -> DbResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// All entries, oldest id first
    pub fn list_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM transactions ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], parse_entry_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Sum amounts per kind for entries created in `[from, to)`
    pub fn kind_totals(
        &self,
        from: &DateTime<FixedOffset>,
        to: &DateTime<FixedOffset>,
    ) -> DbResult<KindTotals> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT type, amount FROM transactions WHERE created_at >= ?1 AND created_at < ?2",
        )?;

        let rows = stmt.query_map(
            params![format_timestamp(from), format_timestamp(to)],
            |row| Ok((row.get::<_, String>(0)?, amount_from_sql(row.get_ref(1)?, 1)?)),
        )?;

        let mut totals = KindTotals::default();
        for row in rows {
            let (kind, amount) = row?;
            match EntryKind::parse(&kind) {
                Some(EntryKind::Income) => {
                    totals.income = totals
                        .income
                        .checked_add(amount)
                        .ok_or(DbError::AmountOverflow)?;
                }
                Some(EntryKind::Expense) => {
                    totals.expense = totals
                        .expense
                        .checked_add(amount)
                        .ok_or(DbError::AmountOverflow)?;
                }
                None => tracing::warn!(kind = %kind, "Skipping entry with unknown type"),
            }
        }
        // balance() must not overflow either
        totals
            .income
            .checked_sub(totals.expense)
            .ok_or(DbError::AmountOverflow)?;
        Ok(totals)
    }

    // ==================== Batch Operations ====================

    /// Insert all rows in one transaction.
    ///
    /// Each row's category is created on demand; a failure to create it is
    /// logged and the row is still inserted. Any row insert failure, or a
    /// failed commit, rolls back the whole batch.
    pub fn insert_batch(&self, rows: &[NewEntry]) -> DbResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        {
            let mut insert = tx.prepare(INSERT_ENTRY)?;
            for row in rows {
                let category = match ensure_category(&tx, &row.category) {
                    Ok(canonical) => canonical,
                    Err(e) => {
                        tracing::warn!(
                            category = %row.category,
                            error = %e,
                            "Failed to ensure category, inserting row anyway"
                        );
                        row.category.clone()
                    }
                };

                insert.execute(params![
                    row.kind.as_str(),
                    category,
                    amount_to_sql(row.amount)?,
                    row.description,
                    format_timestamp(&row.created_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(rows.len())
    }
}

fn find_category(conn: &Connection, name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM categories WHERE name = ?1 COLLATE NOCASE",
        params![name.trim()],
        |row| row.get(0),
    )
    .optional()
}

/// Return the canonical name of `name`, creating the category if needed
fn ensure_category(conn: &Connection, name: &str) -> rusqlite::Result<String> {
    if let Some(existing) = find_category(conn, name)? {
        return Ok(existing);
    }
    let name = name.trim();
    conn.execute(
        "INSERT OR IGNORE INTO categories (name) VALUES (?1)",
        params![name],
    )?;
    Ok(name.to_string())
}

fn amount_to_sql(amount: Decimal) -> DbResult<f64> {
    amount
        .to_f64()
        .ok_or_else(|| DbError::InvalidAmount(amount.to_string()))
}

/// Amounts are stored as REAL for the report scripts. The shortest decimal
/// rendering of the float is the value that was written; floats written by
/// other tools that do not fit that rendering take the nearest decimal.
fn amount_from_sql(value: ValueRef<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let conversion =
        |e: rust_decimal::Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Real, Box::new(e));
    match value {
        ValueRef::Real(f) => Decimal::from_str(&f.to_string())
            .or_else(|_| Decimal::try_from(f))
            .map_err(conversion),
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Text(t) => Decimal::from_str(String::from_utf8_lossy(t).trim()).map_err(conversion),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "amount".to_string(),
            other.data_type(),
        )),
    }
}

/// Parse an entry row selected with `ENTRY_COLUMNS`
fn parse_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let kind_str: String = row.get(1)?;
    let kind = EntryKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown transaction type '{kind_str}'").into(),
        )
    })?;

    let created_str: String = row.get(5)?;
    let created_at = parse_timestamp(&created_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unparseable created_at '{created_str}'").into(),
        )
    })?;

    let description: Option<String> = row.get(4)?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        kind,
        category: row.get(2)?,
        amount: amount_from_sql(row.get_ref(3)?, 3)?,
        description: description.filter(|d| !d.is_empty()),
        created_at,
    })
}
