//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the dispatcher with mock implementations.

use crate::chat::{ChatId, Keyboard, MessageId};
use crate::db::{Database, DbResult, EntryId, FieldChange, KindTotals, LedgerEntry, NewEntry};
use crate::reports::{Report, ReportError};
use crate::telegram::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Persistent ledger storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn list_categories(&self) -> DbResult<Vec<String>>;

    async fn get_entry(&self, id: EntryId) -> DbResult<LedgerEntry>;

    async fn insert_entry(&self, entry: &NewEntry) -> DbResult<EntryId>;

    async fn update_entry(&self, id: EntryId, change: &FieldChange) -> DbResult<()>;

    async fn delete_entry(&self, id: EntryId) -> DbResult<bool>;

    /// All-or-nothing insert of validated rows
    async fn insert_batch(&self, rows: &[NewEntry]) -> DbResult<usize>;

    async fn kind_totals(
        &self,
        from: &DateTime<FixedOffset>,
        to: &DateTime<FixedOffset>,
    ) -> DbResult<KindTotals>;

    async fn list_entries(&self) -> DbResult<Vec<LedgerEntry>>;
}

/// Outbound side of the chat platform
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a message, returning its id
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Replace the text (and keyboard) of an earlier message
    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button press so the client stops its spinner
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Fetch the contents of an uploaded file
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Runs external reports
#[async_trait]
pub trait ReportRunner: Send + Sync {
    /// Run the report for `chat` and return its output
    async fn run(&self, report: Report, chat: ChatId) -> Result<String, ReportError>;
}

// ============================================================================
// Production implementations
// ============================================================================

// SQLite calls are short and the dispatcher is strictly serial, so they run
// inline on the runtime thread.
#[async_trait]
impl LedgerStore for Database {
    async fn list_categories(&self) -> DbResult<Vec<String>> {
        Database::list_categories(self)
    }

    async fn get_entry(&self, id: EntryId) -> DbResult<LedgerEntry> {
        Database::get_entry(self, id)
    }

    async fn insert_entry(&self, entry: &NewEntry) -> DbResult<EntryId> {
        Database::insert_entry(self, entry)
    }

    async fn update_entry(&self, id: EntryId, change: &FieldChange) -> DbResult<()> {
        Database::update_entry(self, id, change)
    }

    async fn delete_entry(&self, id: EntryId) -> DbResult<bool> {
        Database::delete_entry(self, id)
    }

    async fn insert_batch(&self, rows: &[NewEntry]) -> DbResult<usize> {
        Database::insert_batch(self, rows)
    }

    async fn kind_totals(
        &self,
        from: &DateTime<FixedOffset>,
        to: &DateTime<FixedOffset>,
    ) -> DbResult<KindTotals> {
        Database::kind_totals(self, from, to)
    }

    async fn list_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        Database::list_entries(self)
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    async fn list_categories(&self) -> DbResult<Vec<String>> {
        (**self).list_categories().await
    }

    async fn get_entry(&self, id: EntryId) -> DbResult<LedgerEntry> {
        (**self).get_entry(id).await
    }

    async fn insert_entry(&self, entry: &NewEntry) -> DbResult<EntryId> {
        (**self).insert_entry(entry).await
    }

    async fn update_entry(&self, id: EntryId, change: &FieldChange) -> DbResult<()> {
        (**self).update_entry(id, change).await
    }

    async fn delete_entry(&self, id: EntryId) -> DbResult<bool> {
        (**self).delete_entry(id).await
    }

    async fn insert_batch(&self, rows: &[NewEntry]) -> DbResult<usize> {
        (**self).insert_batch(rows).await
    }

    async fn kind_totals(
        &self,
        from: &DateTime<FixedOffset>,
        to: &DateTime<FixedOffset>,
    ) -> DbResult<KindTotals> {
        (**self).kind_totals(from, to).await
    }

    async fn list_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        (**self).list_entries().await
    }
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        (**self).send_message(chat, text, keyboard).await
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        (**self).edit_message(chat, message, text, keyboard).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id).await
    }

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        (**self).send_document(chat, file_name, contents, caption).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        (**self).download_file(file_id).await
    }
}

#[async_trait]
impl<T: ReportRunner + ?Sized> ReportRunner for Arc<T> {
    async fn run(&self, report: Report, chat: ChatId) -> Result<String, ReportError> {
        (**self).run(report, chat).await
    }
}
