//! CSV import and export of ledger entries
//!
//! Import is split in two halves so the store write stays with the caller:
//! [`parse`] validates every row without touching the database, and
//! [`ParsedImport::finish`] folds the batch outcome into an [`ImportReport`].

use crate::db::{
    format_timestamp, parse_amount, parse_timestamp, DbResult, EntryKind, LedgerEntry, NewEntry,
    MAX_DESCRIPTION_CHARS, UNCATEGORIZED,
};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

/// Longest category name accepted from a file, in bytes. Longer names could
/// not be carried in a button payload.
pub const MAX_CATEGORY_BYTES: usize = 60;

/// Column header written by [`export`]
pub const EXPORT_HEADER: [&str; 6] = ["kind", "category", "amount", "description", "created_at", "id"];

/// How many row errors are listed in a chat reply
const MAX_LISTED_ERRORS: usize = 10;

/// A rejected input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based, counting the header row when present
    pub row: usize,
    pub reason: String,
}

/// Validated rows awaiting the batch write
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedImport {
    pub rows: Vec<NewEntry>,
    pub errors: Vec<RowError>,
}

/// Outcome of a whole import
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub inserted: usize,
    pub errors: Vec<RowError>,
    /// Set when the batch write failed and nothing was inserted
    pub batch_failure: Option<String>,
}

impl ParsedImport {
    /// Combine row errors with the result of writing `rows`
    pub fn finish(self, written: DbResult<usize>) -> ImportReport {
        match written {
            Ok(inserted) => ImportReport {
                inserted,
                errors: self.errors,
                batch_failure: None,
            },
            Err(e) => ImportReport {
                inserted: 0,
                errors: self.errors,
                batch_failure: Some(e.to_string()),
            },
        }
    }
}

impl ImportReport {
    /// Chat reply summarising the import
    pub fn render(&self) -> String {
        let mut text = if let Some(reason) = &self.batch_failure {
            format!("Import failed: no rows were inserted ({reason}).")
        } else if self.errors.is_empty() {
            return format!("Import complete: {} rows inserted.", self.inserted);
        } else {
            format!(
                "Import finished: {} rows inserted. There were {} errors:",
                self.inserted,
                self.errors.len()
            )
        };

        if self.batch_failure.is_some() && !self.errors.is_empty() {
            text.push_str(&format!(" {} rows were also invalid:", self.errors.len()));
        }
        for e in self.errors.iter().take(MAX_LISTED_ERRORS) {
            text.push_str(&format!("\nrow {}: {}", e.row, e.reason));
        }
        if self.errors.len() > MAX_LISTED_ERRORS {
            text.push_str(&format!(
                "\n...and {} more",
                self.errors.len() - MAX_LISTED_ERRORS
            ));
        }
        text
    }
}

/// Validate a CSV payload.
///
/// Columns are `kind, category, amount[, description[, created_at]]`; extra
/// columns are ignored. A first row mentioning both `amount` and `kind` (or
/// `type`) is treated as a header. `now` stamps rows without a usable
/// timestamp.
pub fn parse(data: &[u8], now: DateTime<FixedOffset>) -> ParsedImport {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let mut parsed = ParsedImport {
        rows: Vec::new(),
        errors: Vec::new(),
    };

    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                parsed.errors.push(RowError {
                    row,
                    reason: format!("unreadable row: {e}"),
                });
                continue;
            }
        };

        if index == 0 && is_header(&record) {
            continue;
        }

        match parse_row(&record, now) {
            Ok(entry) => parsed.rows.push(entry),
            Err(reason) => parsed.errors.push(RowError { row, reason }),
        }
    }

    parsed
}

fn is_header(record: &StringRecord) -> bool {
    let joined = record.iter().collect::<Vec<_>>().join(",").to_lowercase();
    joined.contains("amount") && (joined.contains("kind") || joined.contains("type"))
}

fn parse_row(record: &StringRecord, now: DateTime<FixedOffset>) -> Result<NewEntry, String> {
    if record.len() < 3 {
        return Err("not enough columns (need at least type, category, amount)".to_string());
    }
    let field = |i: usize| record.get(i).unwrap_or("").trim();

    let kind = EntryKind::parse(field(0)).ok_or_else(|| {
        format!(
            "invalid type '{}' (must be 'income' or 'expense')",
            field(0)
        )
    })?;

    let amount = parse_amount(field(2)).ok_or_else(|| format!("invalid amount '{}'", field(2)))?;

    let category = match field(1) {
        "" => UNCATEGORIZED.to_string(),
        name if name.len() > MAX_CATEGORY_BYTES => {
            return Err(format!(
                "category longer than {MAX_CATEGORY_BYTES} bytes"
            ))
        }
        name => name.to_string(),
    };

    let description = match field(3) {
        "" => None,
        text if text.chars().count() > MAX_DESCRIPTION_CHARS => {
            return Err(format!(
                "description longer than {MAX_DESCRIPTION_CHARS} characters"
            ))
        }
        text => Some(text.to_string()),
    };

    let created_at = parse_import_timestamp(field(4)).unwrap_or(now);

    Ok(NewEntry {
        kind,
        category,
        amount,
        description,
        created_at,
    })
}

/// RFC 3339, then `%Y-%m-%d %H:%M:%S`, then a bare date at midnight.
/// Values without an offset are read as UTC+7.
fn parse_import_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if s.is_empty() {
        return None;
    }
    parse_timestamp(s).or_else(|| {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
        crate::db::local_offset()
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single()
    })
}

/// Write entries as CSV, header first. The id column comes last so the file
/// can be imported again as is.
pub fn export(entries: &[LedgerEntry]) -> csv::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for entry in entries {
        writer.write_record([
            entry.kind.as_str(),
            &entry.category,
            &entry.amount.to_string(),
            entry.description.as_deref().unwrap_or(""),
            &format_timestamp(&entry.created_at),
            &entry.id.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
